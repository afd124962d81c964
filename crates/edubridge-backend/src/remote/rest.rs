//! Row API calls: one table or procedure per request, filters as
//! `column=eq.value` query pairs.

use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::BackendResult;

use super::{RemoteBackend, check_api};

/// Makes the row API answer with one object instead of an array.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

pub type Filter = (&'static str, String);

pub fn eq(column: &'static str, value: impl std::fmt::Display) -> Filter {
    (column, format!("eq.{}", value))
}

impl RemoteBackend {
    pub(crate) async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        select: &str,
        filters: &[Filter],
        order: Option<&str>,
    ) -> BackendResult<Vec<T>> {
        let mut query: Vec<(&str, String)> = vec![("select", select.to_string())];
        query.extend(filters.iter().map(|(k, v)| (*k, v.clone())));
        if let Some(order) = order {
            query.push(("order", order.to_string()));
        }

        let resp = self
            .request(Method::GET, &self.rest_url(table))
            .query(&query)
            .send()
            .await?;
        let rows: Vec<T> = check_api(resp).await?.json().await?;
        debug!(table, rows = rows.len(), "Selected rows");
        Ok(rows)
    }

    /// Insert one row and read it back through `select`.
    pub(crate) async fn insert_returning<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        select: &str,
        body: &B,
    ) -> BackendResult<T> {
        let resp = self
            .request(Method::POST, &self.rest_url(table))
            .query(&[("select", select)])
            .header("Prefer", "return=representation")
            .header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT))
            .json(body)
            .send()
            .await?;
        Ok(check_api(resp).await?.json().await?)
    }

    pub(crate) async fn insert<B: Serialize + ?Sized>(&self, table: &str, body: &B) -> BackendResult<()> {
        let resp = self
            .request(Method::POST, &self.rest_url(table))
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await?;
        check_api(resp).await?;
        Ok(())
    }

    pub(crate) async fn update<B: Serialize + ?Sized>(
        &self,
        table: &str,
        filters: &[Filter],
        body: &B,
    ) -> BackendResult<()> {
        let resp = self
            .request(Method::PATCH, &self.rest_url(table))
            .query(filters)
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await?;
        check_api(resp).await?;
        Ok(())
    }

    pub(crate) async fn delete(&self, table: &str, filters: &[Filter]) -> BackendResult<()> {
        let resp = self
            .request(Method::DELETE, &self.rest_url(table))
            .query(filters)
            .send()
            .await?;
        check_api(resp).await?;
        Ok(())
    }

    pub(crate) async fn rpc<A: Serialize + ?Sized, T: DeserializeOwned>(&self, name: &str, args: &A) -> BackendResult<T> {
        let resp = self
            .request(Method::POST, &self.rest_url(&format!("rpc/{}", name)))
            .json(args)
            .send()
            .await?;
        Ok(check_api(resp).await?.json().await?)
    }

    /// Procedures returning `void` answer with an empty body.
    pub(crate) async fn rpc_void<A: Serialize + ?Sized>(&self, name: &str, args: &A) -> BackendResult<()> {
        let resp = self
            .request(Method::POST, &self.rest_url(&format!("rpc/{}", name)))
            .json(args)
            .send()
            .await?;
        check_api(resp).await?;
        Ok(())
    }

    fn rest_url(&self, path: &str) -> String {
        self.config().endpoint(&format!("rest/v1/{}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn eq_filter_formats_value() {
        let id = Uuid::nil();
        assert_eq!(eq("id", id), ("id", "eq.00000000-0000-0000-0000-000000000000".to_string()));
    }
}
