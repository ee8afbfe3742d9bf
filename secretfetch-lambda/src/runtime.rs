//! AWS Lambda runtime binding

use std::sync::Arc;

use lambda_runtime::{service_fn, LambdaEvent};
use serde_json::Value;
use tracing::{info, info_span, Instrument};

use crate::event::{InvocationContext, InvocationEvent, ResponseEnvelope};
use crate::retriever::SecretRetriever;

/// Serve invocations from the Lambda Runtime API until the host stops us
pub async fn run(retriever: SecretRetriever) -> Result<(), lambda_runtime::Error> {
    info!(variant = %retriever.variant(), "Starting Lambda runtime loop");

    let retriever = Arc::new(retriever);
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let retriever = retriever.clone();
        async move { Ok::<_, lambda_runtime::Error>(invoke(&retriever, event).await) }
    }))
    .await
}

/// Handle one raw Lambda event
pub async fn invoke(retriever: &SecretRetriever, event: LambdaEvent<Value>) -> ResponseEnvelope {
    let (payload, context) = event.into_parts();
    let context = InvocationContext::from(context);
    let span = info_span!("invocation", request_id = %context.request_id);

    retriever
        .handle(&InvocationEvent::from_value(&payload), &context)
        .instrument(span)
        .await
}
