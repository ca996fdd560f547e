/// The sensitive-word filter is an external collaborator (spec.md §1
/// Non-goals): its matching rules live elsewhere, only the interface is
/// named here. `Im` bodies tagged `flag::TEXT` are passed through it before
/// persistence; the default implementation is a pass-through.
#[async_trait::async_trait]
pub trait TextFilter: Send + Sync + 'static {
    async fn filter(&self, text: &str) -> String {
        text.to_string()
    }
}

pub struct NoopFilter;

#[async_trait::async_trait]
impl TextFilter for NoopFilter {}

/// `content` is a JSON body; only its `text` field passes through the
/// filter, matching the teacher's narrow per-field plugin hooks rather than
/// filtering the whole payload.
pub async fn apply_text_filter(filter: &dyn TextFilter, content: &[u8]) -> Vec<u8> {
    let Ok(mut value) = serde_json::from_slice::<serde_json::Value>(content) else {
        return content.to_vec();
    };
    if let Some(text) = value.get("text").and_then(|v| v.as_str()) {
        let filtered = filter.filter(text).await;
        value["text"] = serde_json::Value::String(filtered);
    }
    serde_json::to_vec(&value).unwrap_or_else(|_| content.to_vec())
}
