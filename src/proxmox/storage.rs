use super::client::ProxmoxClient;
use super::resource::StorageItem;
use anyhow::Result;
use log::error;
use reqwest::Method;
use serde_json::Value;

impl ProxmoxClient {
    pub async fn get_storage_content(
        &self,
        storage: &str,
        content_type: Option<&str>,
    ) -> Result<Vec<Value>> {
        let mut path = format!("nodes/{}/storage/{}/content", self.node, storage);
        if let Some(ct) = content_type {
            path.push_str(&format!("?content={}", ct));
        }
        Ok(self.request(Method::GET, &path, None).await?)
    }

    /// ISO images in the image storage. Errors are logged and yield an empty list.
    pub async fn list_isos(&self) -> Vec<StorageItem> {
        self.list_content("iso").await
    }

    /// Container templates in the image storage. Errors are logged and yield an empty list.
    pub async fn list_templates(&self) -> Vec<StorageItem> {
        self.list_content("vztmpl").await
    }

    async fn list_content(&self, content: &str) -> Vec<StorageItem> {
        let storage = self.defaults.image_storage.clone();
        let items = match self.get_storage_content(&storage, Some(content)).await {
            Ok(items) => items,
            Err(e) => {
                error!("Failed to list {} content of {}: {}", content, storage, e);
                return Vec::new();
            }
        };
        let prefix = format!("{}:{}/", storage, content);
        items
            .into_iter()
            .filter(|item| item.get("content").and_then(|c| c.as_str()) == Some(content))
            .filter_map(|item| {
                let volid = item.get("volid")?.as_str()?.to_string();
                Some(StorageItem {
                    name: volid.strip_prefix(&prefix).unwrap_or(&volid).to_string(),
                    size: item.get("size").and_then(|s| s.as_u64()).unwrap_or(0),
                    volid,
                })
            })
            .collect()
    }
}
