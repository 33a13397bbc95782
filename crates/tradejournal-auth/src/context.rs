//! Consumer-side view of the session.

use serde::Serialize;
use tokio::sync::watch;

use crate::manager::SessionManager;
use crate::state::SessionState;

/// What presentation code reads about the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub authenticated: bool,
    pub initialized: bool,
    pub username: Option<String>,
}

impl From<&SessionState> for SessionView {
    fn from(state: &SessionState) -> Self {
        Self {
            authenticated: state.is_authenticated(),
            initialized: state.is_initialized(),
            username: state.username.clone(),
        }
    }
}

/// A mounted consumer of a [`SessionManager`].
///
/// Mounting subscribes and kicks off `initialize()` once. Unmounting only
/// drops the subscription; the manager and its timer keep running.
#[derive(Debug)]
pub struct SessionContext {
    manager: SessionManager,
    receiver: watch::Receiver<SessionState>,
}

impl SessionContext {
    pub fn mount(manager: &SessionManager) -> Self {
        let receiver = manager.subscribe();
        let initializing = manager.clone();
        tokio::spawn(async move {
            initializing.initialize().await;
        });

        Self {
            manager: manager.clone(),
            receiver,
        }
    }

    pub fn state(&self) -> SessionState {
        self.receiver.borrow().clone()
    }

    pub fn view(&self) -> SessionView {
        SessionView::from(&*self.receiver.borrow())
    }

    /// Wait for the next transition. `None` once the manager is gone.
    pub async fn changed(&mut self) -> Option<SessionView> {
        self.receiver.changed().await.ok()?;
        Some(SessionView::from(&*self.receiver.borrow_and_update()))
    }

    /// Wait until initialization has an outcome.
    pub async fn wait_until_initialized(&mut self) -> SessionView {
        let view = match self.receiver.wait_for(|state| state.is_initialized()).await {
            Ok(state) => Some(SessionView::from(&*state)),
            Err(_) => None,
        };
        view.unwrap_or_else(|| self.view())
    }

    pub async fn login(&self) {
        self.manager.login(None).await;
    }

    pub async fn logout(&self) {
        self.manager.logout().await;
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    pub fn unmount(self) {
        tracing::trace!("Session context unmounted");
    }
}
