use futures::future::join_all;
use tracing::{info, warn};

use crate::api::ChunkGoApi;
use crate::error::ClientError;
use crate::page::{Confirm, Page, ToastLevel};

/// Rows of the document listing.
pub trait DocumentRows {
    /// Removes the row of `document_id`; `false` when there is none.
    fn remove_row(&self, document_id: i64) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Declined,
    Deleted,
    Refused(String),
    Unreachable(ClientError),
}

/// Deletes one document after confirmation. The page reloads when its row
/// cannot be found.
pub async fn delete_document<A, P, R>(
    api: &A,
    page: &P,
    rows: &R,
    document_id: i64,
    name: &str,
) -> DeleteOutcome
where
    A: ChunkGoApi,
    P: Page,
    R: DocumentRows,
{
    let confirm = Confirm::destructive(
        "确认删除",
        format!("确定要删除文档 \"{name}\" 吗？此操作不可恢复！"),
        "确定删除",
    );
    if !page.confirm(&confirm).await {
        return DeleteOutcome::Declined;
    }

    match api.delete_document(document_id).await {
        Ok(response) if response.is_success() => {
            info!(document_id, "document deleted");
            page.toast(
                ToastLevel::Success,
                response.message.as_deref().unwrap_or("文档已删除"),
            );
            if !rows.remove_row(document_id) {
                page.reload();
            }
            DeleteOutcome::Deleted
        }
        Ok(response) => {
            let message = response
                .detail
                .or(response.message)
                .unwrap_or_else(|| "删除文档失败".to_string());
            warn!(document_id, %message, "delete refused");
            page.toast(ToastLevel::Error, &message);
            DeleteOutcome::Refused(message)
        }
        Err(err) => {
            warn!(document_id, error = %err, "delete failed");
            page.toast(ToastLevel::Error, &format!("删除文档失败: {err}"));
            DeleteOutcome::Unreachable(err)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDeleteReport {
    pub deleted: Vec<i64>,
    pub failed: Vec<(i64, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchDeleteOutcome {
    NothingSelected,
    Declined,
    Finished(BatchDeleteReport),
}

/// Deletes the selected documents concurrently and reports how many went
/// through.
pub async fn delete_documents<A, P, R>(
    api: &A,
    page: &P,
    rows: &R,
    document_ids: Vec<i64>,
) -> BatchDeleteOutcome
where
    A: ChunkGoApi,
    P: Page,
    R: DocumentRows,
{
    if document_ids.is_empty() {
        page.toast(ToastLevel::Warning, "请选择要删除的文档");
        return BatchDeleteOutcome::NothingSelected;
    }

    let confirm = Confirm::destructive(
        "确认批量删除",
        format!(
            "确定要删除选中的 {} 个文档吗？此操作不可恢复！",
            document_ids.len()
        ),
        "确定删除",
    );
    if !page.confirm(&confirm).await {
        return BatchDeleteOutcome::Declined;
    }

    let results = join_all(document_ids.into_iter().map(|document_id| async move {
        (document_id, api.delete_document(document_id).await)
    }))
    .await;

    let mut report = BatchDeleteReport::default();
    for (document_id, result) in results {
        match result {
            Ok(response) if response.is_success() => {
                rows.remove_row(document_id);
                report.deleted.push(document_id);
            }
            Ok(response) => {
                let reason = response
                    .detail
                    .or(response.message)
                    .unwrap_or_else(|| "删除文档失败".to_string());
                warn!(document_id, %reason, "delete refused");
                report.failed.push((document_id, reason));
            }
            Err(err) => {
                warn!(document_id, error = %err, "delete failed");
                report.failed.push((document_id, err.to_string()));
            }
        }
    }

    let (deleted, failed) = (report.deleted.len(), report.failed.len());
    info!(deleted, failed, "batch delete finished");
    match (deleted, failed) {
        (0, _) => page.toast(ToastLevel::Error, "批量删除失败"),
        (_, 0) => page.toast(ToastLevel::Success, &format!("成功删除 {deleted} 个文档")),
        _ => page.toast(
            ToastLevel::Warning,
            &format!("成功删除 {deleted} 个文档，{failed} 个文档删除失败"),
        ),
    }
    BatchDeleteOutcome::Finished(report)
}
