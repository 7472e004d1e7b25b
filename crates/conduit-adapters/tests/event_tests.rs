//! Event batch adapter scenarios

use chrono::{TimeZone, Utc};
use conduit_adapters::{
    AdapterError, EventBatch, EventHandler, EventRecord, EventRunner, TypedEventHandler, EVENT,
};
use conduit_core::{
    Command, Context, ErrorCapsule, ErrorHandlingSelector, ErrorHandlingStrategyFactory,
    PipelineError, PipelineRunner, RespondStrategy, SequenceComposer,
};
use conduit_test_utils::{default_runner, FaultCommand, OrderPlaced};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

/// Records accepted order ids; rejects the order id `reject`
struct RecordOrder(Arc<Mutex<Vec<String>>>);

impl Command for RecordOrder {
    fn run(&self, context: &mut Context) -> anyhow::Result<()> {
        let order_id = context.variables.get::<OrderPlaced>(EVENT)?.order_id.clone();
        if order_id == "reject" {
            context.push_error(ErrorCapsule::new("order rejected"));
            return Ok(());
        }
        self.0.lock().push(order_id);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "record_order"
    }
}

fn order_handler(seen: &Arc<Mutex<Vec<String>>>) -> TypedEventHandler<OrderPlaced> {
    let mut composer = SequenceComposer::new("order_placed");
    composer.add_command(Arc::new(RecordOrder(Arc::clone(seen))));
    TypedEventHandler::new(Arc::new(composer), default_runner())
}

fn order_body(order_id: &str) -> String {
    json!({"orderId": order_id, "total": "14.50", "placedAt": "2024-03-01T10:00:00Z"}).to_string()
}

#[test]
fn handler_serves_short_type_name() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    assert_eq!(order_handler(&seen).event_type(), "OrderPlaced");
    assert_eq!(
        order_handler(&seen).with_event_type("order.placed").event_type(),
        "order.placed"
    );
}

#[test]
fn handler_maps_event_and_keeps_body() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let context = order_handler(&seen).handle(&order_body("o-1")).unwrap();

    let event = context.variables.get::<OrderPlaced>(EVENT).unwrap();
    assert_eq!(
        event,
        &OrderPlaced {
            order_id: "o-1".into(),
            total: Some(Decimal::from_str("14.50").unwrap()),
            placed_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()),
        }
    );
    assert_eq!(context.body["order_id"], "o-1");
    assert_eq!(context.error_handling().unwrap().as_str(), "raise");
    assert_eq!(*seen.lock(), vec!["o-1".to_owned()]);
}

#[test]
fn handler_raises_recorded_error() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let err = order_handler(&seen).handle(&order_body("reject")).unwrap_err();

    assert!(matches!(
        err,
        AdapterError::Pipeline(PipelineError::Raised(ref capsule)) if capsule.message == "order rejected"
    ));
    assert!(seen.lock().is_empty());
}

#[test]
fn handler_rejects_unmappable_body() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = order_handler(&seen);

    assert!(matches!(handler.handle("{not json"), Err(AdapterError::Codec(_))));
    assert!(matches!(
        handler.handle(r#"{"orderId": "o-9", "total": "lots"}"#),
        Err(AdapterError::Mapping(_))
    ));
    assert!(seen.lock().is_empty());
}

#[test]
fn batch_reports_only_failed_records() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let runner = EventRunner::new(vec![Arc::new(order_handler(&seen))]);

    let batch = EventBatch {
        records: vec![
            EventRecord::new("m-1", "OrderPlaced", order_body("o-1")),
            EventRecord::new("m-2", "OrderShipped", order_body("o-2")),
            EventRecord::new("m-3", "OrderPlaced", "{broken"),
            EventRecord::new("m-4", "OrderPlaced", order_body("reject")),
            EventRecord::new("m-5", "OrderPlaced", order_body("o-5")),
        ],
    };
    let response = runner.run(&batch).unwrap();

    assert_eq!(response.failed_ids(), vec!["m-2", "m-3", "m-4"]);
    assert_eq!(*seen.lock(), vec!["o-1".to_owned(), "o-5".to_owned()]);
}

#[test]
fn faulting_command_fails_record() {
    let mut composer = SequenceComposer::new("faulty");
    composer.add_command(Arc::new(FaultCommand("explode")));
    let handler = TypedEventHandler::<OrderPlaced>::new(Arc::new(composer), default_runner());

    let mut runner = EventRunner::default();
    runner.register(Arc::new(handler));
    let response = runner
        .run(&EventBatch {
            records: vec![EventRecord::new("m-1", "OrderPlaced", order_body("o-1"))],
        })
        .unwrap();

    assert_eq!(response.failed_ids(), vec!["m-1"]);
}

#[test]
fn first_registered_handler_wins() {
    let first = Arc::new(Mutex::new(Vec::new()));
    let second = Arc::new(Mutex::new(Vec::new()));
    let runner = EventRunner::new(vec![
        Arc::new(order_handler(&first)),
        Arc::new(order_handler(&second)),
    ]);

    let response = runner
        .run(&EventBatch {
            records: vec![EventRecord::new("m-1", "OrderPlaced", order_body("o-1"))],
        })
        .unwrap();

    assert!(response.batch_item_failures.is_empty());
    assert_eq!(first.lock().len(), 1);
    assert!(second.lock().is_empty());
}

#[test]
fn missing_raise_strategy_aborts_batch() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut factory = ErrorHandlingStrategyFactory::new(ErrorHandlingSelector::respond());
    factory.register(Arc::new(RespondStrategy));
    let mut composer = SequenceComposer::new("order_placed");
    composer.add_command(Arc::new(RecordOrder(Arc::clone(&seen))));
    let handler = TypedEventHandler::<OrderPlaced>::new(
        Arc::new(composer),
        PipelineRunner::new(Arc::new(factory)),
    );

    let err = EventRunner::new(vec![Arc::new(handler)])
        .run(&EventBatch {
            records: vec![
                EventRecord::new("m-1", "OrderPlaced", order_body("reject")),
                EventRecord::new("m-2", "OrderPlaced", order_body("o-2")),
            ],
        })
        .unwrap_err();

    assert!(err.is_configuration());
    assert!(matches!(
        err,
        AdapterError::Pipeline(PipelineError::StrategyNotFound(ref s)) if s == "raise"
    ));
    assert!(seen.lock().is_empty());
}
