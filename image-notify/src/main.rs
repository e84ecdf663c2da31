use lambda_runtime::{run, service_fn, tracing, Error};
use std::sync::Arc;

mod event_handler;
mod log;
mod records;

use event_handler::{function_handler, NotificationHandler};
use crate::log::TracingLog;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let handler = Arc::new(NotificationHandler::new(TracingLog));

    run(service_fn(move |event| {
        let handler = Arc::clone(&handler);
        async move { function_handler(handler, event).await }
    }))
    .await
}
