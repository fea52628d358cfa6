use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use aws_sdk_lambda::Client as LambdaClient;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Lambda request failed: {0}")]
    Sdk(String),

    #[error("Function {function_name} reported {kind}: {body}")]
    Function {
        function_name: String,
        kind: String,
        body: String,
    },
}

/// Result of a synchronous invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResponse {
    pub status_code: i32,
    /// Set when the function itself raised (`Handled`/`Unhandled`)
    pub function_error: Option<String>,
    pub body: String,
}

impl InvocationResponse {
    /// Convert a function-reported failure into an error
    pub fn into_result(self, function_name: &str) -> Result<Self, InvocationError> {
        match self.function_error {
            Some(kind) => Err(InvocationError::Function {
                function_name: function_name.to_string(),
                kind,
                body: self.body,
            }),
            None => Ok(self),
        }
    }
}

/// Remote compute invocation
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    /// Invoke `function_name` synchronously with a JSON body
    async fn invoke(
        &self,
        function_name: &str,
        payload: &serde_json::Value,
    ) -> Result<InvocationResponse, InvocationError>;
}

/// Lambda-backed invoker using `RequestResponse` invocations
#[derive(Clone, Debug)]
pub struct LambdaInvoker {
    client: LambdaClient,
}

impl LambdaInvoker {
    pub fn new(aws_config: &SdkConfig) -> Self {
        Self {
            client: LambdaClient::new(aws_config),
        }
    }
}

#[async_trait]
impl FunctionInvoker for LambdaInvoker {
    #[instrument(skip(self, payload))]
    async fn invoke(
        &self,
        function_name: &str,
        payload: &serde_json::Value,
    ) -> Result<InvocationResponse, InvocationError> {
        let payload = serde_json::to_vec(payload)?;

        let response = self
            .client
            .invoke()
            .function_name(function_name)
            .invocation_type(InvocationType::RequestResponse)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|e| InvocationError::Sdk(DisplayErrorContext(&e).to_string()))?;

        let body = response
            .payload()
            .map(|blob| String::from_utf8_lossy(blob.as_ref()).into_owned())
            .unwrap_or_default();

        let result = InvocationResponse {
            status_code: response.status_code(),
            function_error: response.function_error().map(String::from),
            body,
        };

        match result.function_error {
            Some(ref kind) => warn!(
                status_code = result.status_code,
                function_error = %kind,
                body = %result.body,
                "Function reported an error"
            ),
            None => info!(
                status_code = result.status_code,
                body = %result.body,
                "Function response"
            ),
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result_passes_clean_responses() {
        let response = InvocationResponse {
            status_code: 200,
            function_error: None,
            body: "{\"statusCode\":200}".to_string(),
        };

        assert_eq!(
            response.clone().into_result("vehicles_add_operation").unwrap(),
            response
        );
    }

    #[test]
    fn test_into_result_surfaces_function_errors() {
        let response = InvocationResponse {
            status_code: 200,
            function_error: Some("Unhandled".to_string()),
            body: "{\"errorMessage\":\"boom\"}".to_string(),
        };

        match response.into_result("vehicles_add_operation") {
            Err(InvocationError::Function {
                function_name,
                kind,
                ..
            }) => {
                assert_eq!(function_name, "vehicles_add_operation");
                assert_eq!(kind, "Unhandled");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
