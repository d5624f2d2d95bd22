use std::collections::HashMap;
use std::time::Duration;

use derive_more::Display;
use log::{info, warn};
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use builder::{
    Builder, Expression, FormRecord, MaterializeError, NodeView, PathKey, RecordError, RenderNode,
};
use telemetry::{IsErr, Measure};

use crate::config::SessionConfig;

lazy_static! {
    static ref MATERIALIZE_MEASURE: Measure = Measure::new("session", "materialize");
}

#[derive(Debug, Display, Clone, PartialEq)]
pub enum SessionError {
    #[display(fmt = "Not Found")]
    NotFound,

    #[display(fmt = "Session limit of {} reached", _0)]
    Full(usize),

    #[display(fmt = "Submission already in progress")]
    Busy,

    #[display(fmt = "{}", _0)]
    Incomplete(MaterializeError),

    #[display(fmt = "{}", _0)]
    InvalidRecord(RecordError),
}

impl std::error::Error for SessionError {}

impl IsErr for SessionError {
    fn is_err(&self) -> bool {
        matches!(self, SessionError::Full(_))
    }
}

impl From<MaterializeError> for SessionError {
    fn from(e: MaterializeError) -> Self {
        SessionError::Incomplete(e)
    }
}

impl From<RecordError> for SessionError {
    fn from(e: RecordError) -> Self {
        SessionError::InvalidRecord(e)
    }
}

/// A materialized expression and the builder revision it was taken from
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub revision: u64,
    pub expression: Expression,
}

struct Session {
    builder: Builder,
    revision: u64,
    // Kept across failed submissions, dropped by any edit
    prepared: Option<Prepared>,
    in_flight: bool,
    touched: Instant,
}

impl Session {
    fn new(builder: Builder) -> Session {
        Session {
            builder,
            revision: 0,
            prepared: None,
            in_flight: false,
            touched: Instant::now(),
        }
    }

    fn edited(&mut self) {
        self.revision += 1;
        self.prepared = None;
    }
}

/// Editing sessions, each owning a single [`Builder`]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
    max_sessions: usize,
    idle_timeout: Duration,
}

fn touch(sessions: &mut HashMap<Uuid, Session>, id: Uuid) -> Result<&mut Session, SessionError> {
    let session = sessions.get_mut(&id).ok_or(SessionError::NotFound)?;
    session.touched = Instant::now();
    Ok(session)
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> SessionStore {
        SessionStore {
            sessions: Mutex::new(Default::default()),
            max_sessions: config.max_sessions,
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
        }
    }

    pub async fn create(&self, builder: Builder) -> Result<(Uuid, RenderNode), SessionError> {
        let mut sessions = self.sessions.lock().await;

        let before = sessions.len();
        let idle_timeout = self.idle_timeout;
        sessions.retain(|_, session| {
            session.in_flight || session.touched.elapsed() < idle_timeout
        });
        if sessions.len() < before {
            info!("Expired {} idle sessions", before - sessions.len());
        }

        if sessions.len() >= self.max_sessions {
            warn!("Rejecting new session, {} open", sessions.len());
            return Err(SessionError::Full(self.max_sessions));
        }

        let id = Uuid::new_v4();
        let tree = builder.render();
        sessions.insert(id, Session::new(builder));
        info!("Created session {}", id);
        Ok((id, tree))
    }

    pub async fn render(&self, id: Uuid) -> Result<RenderNode, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session = touch(&mut sessions, id)?;
        Ok(session.builder.render())
    }

    pub async fn node(&self, id: Uuid, path: &PathKey) -> Result<NodeView, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session = touch(&mut sessions, id)?;
        Ok(session.builder.get_node_view(path))
    }

    pub async fn record(&self, id: Uuid) -> Result<FormRecord, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session = touch(&mut sessions, id)?;
        Ok(session.builder.to_record())
    }

    pub async fn apply(&self, id: Uuid, record: &FormRecord) -> Result<RenderNode, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session = touch(&mut sessions, id)?;
        // A rejected record leaves the builder as it was
        session.builder.apply_record(record)?;
        session.edited();
        Ok(session.builder.render())
    }

    /// Materializes the session for submission, reusing the result of an
    /// earlier call if nothing has been edited since.
    ///
    /// Marks the session as submitting until [`SessionStore::complete`] or
    /// [`SessionStore::release`] is called.
    pub async fn prepare(&self, id: Uuid) -> Result<Prepared, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session = touch(&mut sessions, id)?;

        if session.in_flight {
            return Err(SessionError::Busy);
        }

        let prepared = match session.prepared.clone() {
            Some(prepared) => prepared,
            None => {
                let builder = &session.builder;
                let expression = MATERIALIZE_MEASURE
                    .record(|| builder.materialize().map_err(SessionError::from))?;
                let prepared = Prepared {
                    revision: session.revision,
                    expression,
                };
                session.prepared = Some(prepared.clone());
                prepared
            }
        };

        session.in_flight = true;
        Ok(prepared)
    }

    /// Ends a failed submission, keeping the prepared expression for retry
    pub async fn release(&self, id: Uuid) {
        if let Some(session) = self.sessions.lock().await.get_mut(&id) {
            session.in_flight = false;
        }
    }

    /// Discards a session after a successful submission of `revision`.
    ///
    /// Returns false, keeping the session, if it was edited in the meantime.
    pub async fn complete(&self, id: Uuid, revision: u64) -> bool {
        let mut sessions = self.sessions.lock().await;
        let session = match sessions.get_mut(&id) {
            Some(session) => session,
            None => return false,
        };

        if session.revision != revision {
            warn!("Session {} edited during submission, keeping it", id);
            session.in_flight = false;
            return false;
        }

        sessions.remove(&id);
        info!("Completed session {}", id);
        true
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(&id).ok_or(SessionError::NotFound)?;
        info!("Discarded session {}", id);
        Ok(())
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
