use lambda_runtime::{Error, LambdaEvent};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::log::NotificationLog;
use crate::records::{self, ExtractError};

const COMPLETE: &str = "Processing complete";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl Response {
    pub fn complete() -> Self {
        Self::new(200, COMPLETE)
    }

    pub fn failed(message: &str) -> Self {
        Self::new(500, &format!("Error: {message}"))
    }

    // The body is a JSON-encoded string, quotes included.
    fn new(status_code: u16, text: &str) -> Self {
        Self {
            status_code,
            body: Value::from(text).to_string(),
        }
    }
}

/// Logs every object named by an S3 notification and reports the outcome.
///
/// Nothing escapes `handle`: extraction failures become a 500 response plus one
/// error log entry, and records after the failing one are not visited.
pub struct NotificationHandler<L> {
    log: L,
}

impl<L: NotificationLog> NotificationHandler<L> {
    pub fn new(log: L) -> Self {
        Self { log }
    }

    pub fn handle(&self, event: &Value) -> Response {
        match self.process(event) {
            Ok(()) => Response::complete(),
            Err(err) => {
                let message = err.to_string();
                self.log.error(&format!("Error processing event: {message}"));
                Response::failed(&message)
            }
        }
    }

    fn process(&self, event: &Value) -> Result<(), ExtractError> {
        for key in records::object_keys(event)? {
            self.log.info(&format!("Image received: {}", key?));
        }
        Ok(())
    }
}

/// Invocation entry point. The context is not consulted.
pub(crate) async fn function_handler<L: NotificationLog>(
    handler: Arc<NotificationHandler<L>>,
    event: LambdaEvent<Value>,
) -> Result<Response, Error> {
    Ok(handler.handle(&event.payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::testing::{Level, RecordingLog};
    use lambda_runtime::Context;
    use serde_json::json;

    fn record(key: &str) -> Value {
        json!({
            "eventName": "ObjectCreated:Put",
            "s3": { "bucket": { "name": "uploads" }, "object": { "key": key, "size": 1024 } }
        })
    }

    #[test]
    fn empty_batch_completes_without_info_entries() {
        for event in [json!({ "Records": [] }), json!({})] {
            let log = RecordingLog::default();
            let response = NotificationHandler::new(&log).handle(&event);

            assert_eq!(
                response,
                Response {
                    status_code: 200,
                    body: "\"Processing complete\"".to_string()
                }
            );
            assert!(log.entries().is_empty());
        }
    }

    #[test]
    fn logs_one_entry_per_record_in_order() {
        let log = RecordingLog::default();
        let event = json!({
            "Records": [record("cats/1.jpg"), record("cats/2.jpg"), record("dogs/1.png")]
        });

        let response = NotificationHandler::new(&log).handle(&event);

        assert_eq!(response, Response::complete());
        assert_eq!(
            log.at(Level::Info),
            vec![
                "Image received: cats/1.jpg",
                "Image received: cats/2.jpg",
                "Image received: dogs/1.png",
            ]
        );
        assert!(log.at(Level::Error).is_empty());
    }

    #[test]
    fn missing_key_stops_the_batch() {
        let log = RecordingLog::default();
        let event = json!({
            "Records": [
                record("first.jpg"),
                { "s3": { "bucket": { "name": "uploads" }, "object": {} } },
                record("never.jpg"),
            ]
        });

        let response = NotificationHandler::new(&log).handle(&event);

        assert_eq!(response.status_code, 500);
        assert_eq!(
            response.body,
            "\"Error: record 1: missing field `key`\""
        );
        assert_eq!(
            log.entries(),
            vec![
                (Level::Info, "Image received: first.jpg".to_string()),
                (
                    Level::Error,
                    "Error processing event: record 1: missing field `key`".to_string()
                ),
            ]
        );
    }

    #[test]
    fn non_list_records_fail_before_any_record() {
        let log = RecordingLog::default();
        let response = NotificationHandler::new(&log).handle(&json!({ "Records": "nope" }));

        assert_eq!(response, Response::failed("'Records' is not a list"));
        assert_eq!(log.at(Level::Error).len(), 1);
        assert!(log.at(Level::Info).is_empty());
    }

    #[test]
    fn repeated_invocations_give_identical_responses() {
        let log = RecordingLog::default();
        let handler = NotificationHandler::new(&log);
        let event = json!({ "Records": [record("a.jpg"), record("b.jpg")] });

        let first = handler.handle(&event);
        let second = handler.handle(&event);

        assert_eq!(first, second);
        assert_eq!(log.at(Level::Info).len(), 4);
    }

    #[test]
    fn body_always_decodes_to_a_string() {
        let log = RecordingLog::default();
        let handler = NotificationHandler::new(&log);
        let events = [
            json!({ "Records": [record("quote\"d.jpg")] }),
            json!({ "Records": [{ "s3": { "bucket": { "name": "b" }, "object": {} } }] }),
            json!(null),
        ];

        for event in events {
            let response = handler.handle(&event);
            let decoded: String = serde_json::from_str(&response.body).unwrap();
            assert!(decoded == COMPLETE || decoded.starts_with("Error: "));
        }
    }

    #[test]
    fn non_string_leaves_are_logged_not_rejected() {
        let log = RecordingLog::default();
        let event = json!({
            "Records": [
                { "s3": { "bucket": { "name": "b" }, "object": { "key": 42 } } },
                { "s3": { "bucket": { "name": 7 }, "object": { "key": null } } },
            ]
        });

        let response = NotificationHandler::new(&log).handle(&event);

        assert_eq!(response, Response::complete());
        assert_eq!(
            log.at(Level::Info),
            vec!["Image received: 42", "Image received: null"]
        );
        assert!(log.at(Level::Error).is_empty());
    }

    #[test]
    fn empty_string_or_object_records_are_not_a_list() {
        for records in [json!(""), json!({})] {
            let log = RecordingLog::default();
            let response = NotificationHandler::new(&log).handle(&json!({ "Records": records }));

            assert_eq!(response.status_code, 500);
            assert_eq!(
                log.entries(),
                vec![(
                    Level::Error,
                    "Error processing event: 'Records' is not a list".to_string()
                )]
            );
        }
    }

    #[test]
    fn error_messages_are_escaped_in_the_body() {
        let response = Response::failed("bad \"key\"\n");
        assert_eq!(response.body, r#""Error: bad \"key\"\n""#);
    }

    #[test]
    fn response_uses_status_code_field_name() {
        let value = serde_json::to_value(Response::complete()).unwrap();
        assert_eq!(
            value,
            json!({ "statusCode": 200, "body": "\"Processing complete\"" })
        );
    }

    #[tokio::test]
    async fn function_handler_never_returns_err() {
        let log = RecordingLog::default();
        let handler = Arc::new(NotificationHandler::new(&log));

        let ok = function_handler(
            Arc::clone(&handler),
            LambdaEvent::new(json!({ "Records": [record("x.jpg")] }), Context::default()),
        )
        .await
        .expect("expected Ok(_) value");
        assert_eq!(ok.status_code, 200);

        let failed = function_handler(
            handler,
            LambdaEvent::new(json!({ "Records": [{}] }), Context::default()),
        )
        .await
        .expect("expected Ok(_) value");
        assert_eq!(failed.status_code, 500);
        assert_eq!(log.at(Level::Error).len(), 1);
    }
}
