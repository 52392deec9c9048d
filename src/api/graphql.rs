//! Implements `Remote` by posting GraphQL documents to the expense server.

use crate::api::queries::{CREATE_EXPENSE, DELETE_EXPENSE, GET_EXPENSES_IN_RANGE, UPDATE_EXPENSE};
use crate::api::Remote;
use crate::model::{ExpenseRecord, ExpenseVars};
use crate::period::DateRange;
use crate::Result;
use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// A `Remote` backed by a GraphQL endpoint.
pub struct GraphqlRemote {
    client: reqwest::Client,
    endpoint: Url,
    credentials: Option<String>,
}

impl GraphqlRemote {
    /// `credentials`, when present, is sent as a bearer token. `timeout` bounds each request.
    pub fn new(endpoint: Url, credentials: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("expenses/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Unable to create the HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            credentials,
        })
    }

    /// Posts `query` and decodes `data.<field>` from the response.
    async fn execute<T>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
        field: &str,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        trace!("{operation} variables: {variables}");
        let body = GraphqlRequest {
            query,
            variables,
            operation_name: operation,
        };
        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(token) = &self.credentials {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Unable to reach {} for {operation}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("{operation} failed with HTTP {status}: {text}");
        }

        let payload: GraphqlResponse = response
            .json()
            .await
            .with_context(|| format!("Unable to parse the {operation} response"))?;
        debug!("{operation} succeeded");
        payload.into_field(operation, field)
    }
}

#[async_trait::async_trait]
impl Remote for GraphqlRemote {
    async fn create_expense(&self, vars: &ExpenseVars) -> Result<ExpenseRecord> {
        vars.validate(false)?;
        let variables = serde_json::to_value(vars).context("Unable to serialize variables")?;
        self.execute("CreateExpense", CREATE_EXPENSE, variables, "createExpense")
            .await
    }

    async fn update_expense(&self, vars: &ExpenseVars) -> Result<ExpenseRecord> {
        vars.validate(true)?;
        let variables = serde_json::to_value(vars).context("Unable to serialize variables")?;
        self.execute("UpdateExpense", UPDATE_EXPENSE, variables, "updateExpense")
            .await
    }

    async fn delete_expense(&self, id: &str) -> Result<ExpenseRecord> {
        self.execute(
            "DeleteExpense",
            DELETE_EXPENSE,
            json!({ "id": id }),
            "deleteExpense",
        )
        .await
    }

    async fn fetch_expenses(&self, range: &DateRange) -> Result<Vec<ExpenseRecord>> {
        let variables = serde_json::to_value(range).context("Unable to serialize variables")?;
        self.execute(
            "GetExpensesInRange",
            GET_EXPENSES_IN_RANGE,
            variables,
            "getExpensesInRange",
        )
        .await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: Value,
    operation_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

impl GraphqlResponse {
    fn into_field<T>(self, operation: &str, field: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if !self.errors.is_empty() {
            let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
            bail!("{operation} returned errors: {}", messages.join("; "));
        }
        let value = self
            .data
            .and_then(|mut data| data.get_mut(field).map(Value::take))
            .filter(|v| !v.is_null())
            .with_context(|| format!("{operation} returned no '{field}'"))?;
        serde_json::from_value(value)
            .with_context(|| format!("Unable to decode '{field}' from the {operation} response"))
    }
}
