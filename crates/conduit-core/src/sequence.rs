//! Sequence composition
//!
//! A [`SequenceComposer`] is an ordered list of commands and nested
//! composers. It is declared once, through [`SequenceBuilder`] or directly,
//! and then flattened into an [`ExecutionPlan`] any number of times.
//! Flattening only reads the declaration, so repeated calls yield identical
//! plans.

use crate::command::Command;
use std::sync::Arc;

/// One entry of a composer's declaration
#[derive(Debug, Clone)]
pub enum SequenceComponent {
    /// A single command
    Command(Arc<dyn Command>),
    /// A nested composer, expanded in place when flattened
    Sequence(Arc<SequenceComposer>),
}

/// Declares the components of a composer
pub trait SequenceBuilder {
    /// Append components in execution order
    fn build(&self, composer: &mut SequenceComposer);
}

/// Ordered, immutable-after-build declaration of a pipeline
#[derive(Debug, Clone, Default)]
pub struct SequenceComposer {
    name: String,
    components: Vec<SequenceComponent>,
}

impl SequenceComposer {
    /// Create an empty composer for direct declaration
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
        }
    }

    /// Create a composer declared by `builder`
    ///
    /// The builder runs exactly once.
    #[must_use]
    pub fn compose(name: impl Into<String>, builder: &impl SequenceBuilder) -> Self {
        let mut composer = Self::new(name);
        builder.build(&mut composer);
        tracing::debug!(
            composer = %composer.name,
            components = composer.components.len(),
            "sequence composed"
        );
        composer
    }

    /// Append a command
    pub fn add_command(&mut self, command: Arc<dyn Command>) -> &mut Self {
        self.components.push(SequenceComponent::Command(command));
        self
    }

    /// Append a nested composer
    pub fn add_subsequence(&mut self, composer: Arc<SequenceComposer>) -> &mut Self {
        self.components.push(SequenceComponent::Sequence(composer));
        self
    }

    /// Composer name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared components, unflattened
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[SequenceComponent] {
        &self.components
    }

    /// Flatten nested composers depth-first into a single command list
    #[must_use]
    pub fn flatten(&self) -> ExecutionPlan {
        let mut commands = Vec::new();
        self.flatten_into(&mut commands);
        ExecutionPlan { commands }
    }

    fn flatten_into(&self, commands: &mut Vec<Arc<dyn Command>>) {
        for component in &self.components {
            match component {
                SequenceComponent::Command(command) => commands.push(Arc::clone(command)),
                SequenceComponent::Sequence(nested) => nested.flatten_into(commands),
            }
        }
    }
}

/// Flat, ordered list of commands ready to run
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    commands: Vec<Arc<dyn Command>>,
}

impl ExecutionPlan {
    /// Number of commands
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Check if the plan has no commands
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterate commands in execution order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Command>> {
        self.commands.iter()
    }

    /// Command names in execution order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.commands.iter().map(|c| c.name()).collect()
    }
}

impl<'a> IntoIterator for &'a ExecutionPlan {
    type Item = &'a Arc<dyn Command>;
    type IntoIter = std::slice::Iter<'a, Arc<dyn Command>>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
