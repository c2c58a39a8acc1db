//! reqwest-backed repository clients

use super::{CartRepository, ProductRepository, RepositoryFuture, RepositoryResult};
use crate::error::RepositoryError;
use crate::types::{CartItem, Product, ProductId};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// One JSON REST resource rooted at `base_url`
#[derive(Clone, Debug)]
struct RestResource {
    client: Client,
    base_url: String,
}

impl RestResource {
    fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn item_url(&self, id: &ProductId) -> String {
        format!("{}/{}", self.base_url, id)
    }

    async fn list<T: DeserializeOwned>(self) -> RepositoryResult<Vec<T>> {
        tracing::debug!(url = %self.base_url, "GET");
        let response = self.client.get(&self.base_url).send().await;
        decode(response).await
    }

    async fn get<T: DeserializeOwned>(self, id: ProductId) -> RepositoryResult<T> {
        let url = self.item_url(&id);
        tracing::debug!(%url, "GET");
        let response = self.client.get(&url).send().await;
        decode(response).await
    }

    async fn create<T: Serialize + DeserializeOwned>(self, body: T) -> RepositoryResult<T> {
        tracing::debug!(url = %self.base_url, "POST");
        let response = self.client.post(&self.base_url).json(&body).send().await;
        decode(response).await
    }

    async fn update<T: Serialize + DeserializeOwned>(
        self,
        id: ProductId,
        body: T,
    ) -> RepositoryResult<T> {
        let url = self.item_url(&id);
        tracing::debug!(%url, "PUT");
        let response = self.client.put(&url).json(&body).send().await;
        decode(response).await
    }

    async fn delete(self, id: ProductId) -> RepositoryResult<()> {
        let url = self.item_url(&id);
        tracing::debug!(%url, "DELETE");
        let response = self.client.delete(&url).send().await;
        // Body is an empty object or nothing at all
        checked(response).await.map(drop)
    }
}

/// Map transport failures and non-2xx statuses to [`RepositoryError`]
async fn checked(response: reqwest::Result<Response>) -> RepositoryResult<Response> {
    let response = response.map_err(|e| RepositoryError::RequestFailed(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), "Backend rejected request");
    Err(RepositoryError::Status {
        status: status.as_u16(),
        message: body,
    })
}

async fn decode<T: DeserializeOwned>(response: reqwest::Result<Response>) -> RepositoryResult<T> {
    let body = checked(response)
        .await?
        .text()
        .await
        .map_err(|e| RepositoryError::RequestFailed(e.to_string()))?;

    serde_json::from_str(&body).map_err(|e| RepositoryError::ResponseParseFailed(e.to_string()))
}

/// Products service client
#[derive(Clone, Debug)]
pub struct HttpProductRepository {
    resource: RestResource,
}

impl HttpProductRepository {
    /// Client for the products resource at `base_url` (e.g. `http://localhost:5000/products`)
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Client sharing an existing connection pool
    #[must_use]
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            resource: RestResource::new(client, base_url),
        }
    }
}

impl ProductRepository for HttpProductRepository {
    fn list(&self) -> RepositoryFuture<Vec<Product>> {
        Box::pin(self.resource.clone().list())
    }

    fn get(&self, id: &ProductId) -> RepositoryFuture<Product> {
        Box::pin(self.resource.clone().get(id.clone()))
    }

    fn create(&self, product: Product) -> RepositoryFuture<Product> {
        Box::pin(self.resource.clone().create(product))
    }

    fn update(&self, id: &ProductId, product: Product) -> RepositoryFuture<Product> {
        Box::pin(self.resource.clone().update(id.clone(), product))
    }

    fn delete(&self, id: &ProductId) -> RepositoryFuture<()> {
        Box::pin(self.resource.clone().delete(id.clone()))
    }
}

/// Cart service client
#[derive(Clone, Debug)]
pub struct HttpCartRepository {
    resource: RestResource,
}

impl HttpCartRepository {
    /// Client for the cart resource at `base_url` (e.g. `http://localhost:5001/cart`)
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Client sharing an existing connection pool
    #[must_use]
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            resource: RestResource::new(client, base_url),
        }
    }
}

impl CartRepository for HttpCartRepository {
    fn list(&self) -> RepositoryFuture<Vec<CartItem>> {
        Box::pin(self.resource.clone().list())
    }

    fn get(&self, id: &ProductId) -> RepositoryFuture<CartItem> {
        Box::pin(self.resource.clone().get(id.clone()))
    }

    fn create(&self, item: CartItem) -> RepositoryFuture<CartItem> {
        Box::pin(self.resource.clone().create(item))
    }

    fn update(&self, id: &ProductId, item: CartItem) -> RepositoryFuture<CartItem> {
        Box::pin(self.resource.clone().update(id.clone(), item))
    }

    fn delete(&self, id: &ProductId) -> RepositoryFuture<()> {
        Box::pin(self.resource.clone().delete(id.clone()))
    }
}
