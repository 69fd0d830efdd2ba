use tracing::{info, warn};

use crate::api::ChunkGoApi;
use crate::error::ClientError;
use crate::models::KnowledgeBase;
use crate::page::{Page, ToastLevel};

/// Connection test button plus the knowledge-base select it unlocks.
pub trait ConnectionPanel {
    /// Disables the test button while the check runs.
    fn set_connecting(&self);
    fn restore(&self);
    /// Fills the destination select, enables the push trigger and marks the
    /// test button connected.
    fn show_knowledge_bases(&self, bases: &[KnowledgeBase]);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(Vec<KnowledgeBase>),
    Rejected(String),
    NoKnowledgeBases,
    Unreachable(ClientError),
}

/// Tests the Dify connection and, when it works, loads the knowledge bases.
pub async fn connect<A, P, C>(api: &A, page: &P, panel: &C) -> ConnectOutcome
where
    A: ChunkGoApi,
    P: Page,
    C: ConnectionPanel,
{
    panel.set_connecting();

    match api.test_dify_connection().await {
        Ok(check) if check.status == "success" => {
            page.toast(ToastLevel::Success, "连接成功！正在获取知识库列表...");
        }
        Ok(check) => {
            let message = check.message.unwrap_or_else(|| "未知错误".to_string());
            warn!(%message, "dify connection rejected");
            page.toast(ToastLevel::Error, &format!("连接失败: {message}"));
            panel.restore();
            return ConnectOutcome::Rejected(message);
        }
        Err(err) => {
            warn!(error = %err, "dify connection test failed");
            page.toast(ToastLevel::Error, &format!("连接测试失败: {err}"));
            panel.restore();
            return ConnectOutcome::Unreachable(err);
        }
    }

    match api.knowledge_bases().await {
        Ok(list) if list.status == "success" && !list.data.is_empty() => {
            info!(count = list.data.len(), "loaded dify knowledge bases");
            panel.show_knowledge_bases(&list.data);
            ConnectOutcome::Connected(list.data)
        }
        Ok(list) => {
            warn!(status = %list.status, message = ?list.message, "no dify knowledge bases");
            page.toast(ToastLevel::Error, "未找到知识库或获取失败");
            panel.restore();
            ConnectOutcome::NoKnowledgeBases
        }
        Err(err) => {
            warn!(error = %err, "loading dify knowledge bases failed");
            page.toast(ToastLevel::Error, &format!("获取知识库列表失败: {err}"));
            panel.restore();
            ConnectOutcome::Unreachable(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionCheck, KnowledgeBaseList};
    use crate::testing::{ApiCall, FakeApi, FakePage, FakePanel, PageEvent, PanelState};

    fn base(id: &str, name: &str) -> KnowledgeBase {
        KnowledgeBase {
            id: id.into(),
            name: name.into(),
        }
    }

    fn ok_check() -> Result<ConnectionCheck, ClientError> {
        Ok(ConnectionCheck {
            status: "success".into(),
            message: None,
        })
    }

    #[tokio::test]
    async fn successful_connection_fills_the_select() {
        let bases = vec![base("kb-1", "产品手册"), base("kb-2", "FAQ")];
        let api = FakeApi::default()
            .dify_check_reply(ok_check())
            .knowledge_bases_reply(Ok(KnowledgeBaseList {
                status: "success".into(),
                data: bases.clone(),
                message: None,
            }));
        let page = FakePage::default();
        let panel = FakePanel::default();

        assert_eq!(
            connect(&api, &page, &panel).await,
            ConnectOutcome::Connected(bases.clone())
        );
        assert_eq!(api.calls(), vec![ApiCall::TestDify, ApiCall::KnowledgeBases]);
        assert_eq!(panel.state(), PanelState::Connected(bases));
        assert_eq!(
            page.events(),
            vec![PageEvent::Toast(
                ToastLevel::Success,
                "连接成功！正在获取知识库列表...".into()
            )]
        );
    }

    #[tokio::test]
    async fn rejected_connection_restores_the_button() {
        let api = FakeApi::default().dify_check_reply(Ok(ConnectionCheck {
            status: "error".into(),
            message: Some("API Key 无效".into()),
        }));
        let page = FakePage::default();
        let panel = FakePanel::default();

        assert_eq!(
            connect(&api, &page, &panel).await,
            ConnectOutcome::Rejected("API Key 无效".into())
        );
        assert_eq!(api.calls(), vec![ApiCall::TestDify]);
        assert_eq!(panel.state(), PanelState::Restored);
        assert_eq!(
            page.events(),
            vec![PageEvent::Toast(ToastLevel::Error, "连接失败: API Key 无效".into())]
        );
    }

    #[tokio::test]
    async fn empty_knowledge_base_list_is_an_error() {
        let api = FakeApi::default()
            .dify_check_reply(ok_check())
            .knowledge_bases_reply(Ok(KnowledgeBaseList {
                status: "success".into(),
                data: vec![],
                message: None,
            }));
        let page = FakePage::default();
        let panel = FakePanel::default();

        assert_eq!(connect(&api, &page, &panel).await, ConnectOutcome::NoKnowledgeBases);
        assert_eq!(panel.state(), PanelState::Restored);
        assert_eq!(
            page.events().last(),
            Some(&PageEvent::Toast(ToastLevel::Error, "未找到知识库或获取失败".into()))
        );
    }

    #[tokio::test]
    async fn unreachable_backend_restores_the_button() {
        let api = FakeApi::default()
            .dify_check_reply(Err(ClientError::Transport("connection refused".into())));
        let page = FakePage::default();
        let panel = FakePanel::default();

        assert!(matches!(
            connect(&api, &page, &panel).await,
            ConnectOutcome::Unreachable(_)
        ));
        assert_eq!(panel.state(), PanelState::Restored);
        assert_eq!(
            page.events(),
            vec![PageEvent::Toast(
                ToastLevel::Error,
                "连接测试失败: network error: connection refused".into()
            )]
        );
    }
}
