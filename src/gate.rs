use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::AccessLevel;

pub const DEFAULT_USER_CODE: &str = "chu123456";
pub const DEFAULT_ADMIN_CODE: &str = "hcy123456";

/// Shared-secret gate: a fixed table from code to tier, compared by exact
/// string equality. There is no per-user identity behind a tier.
#[derive(Debug, Clone)]
pub struct AccessGate {
    codes: HashMap<String, AccessLevel>,
}

impl AccessGate {
    pub fn new(user_code: &str, admin_code: &str) -> Result<Self> {
        if user_code.is_empty() || admin_code.is_empty() {
            return Err(Error::Config("access codes must not be empty".to_string()));
        }
        if user_code == admin_code {
            return Err(Error::Config(
                "user and admin access codes must differ".to_string(),
            ));
        }

        let codes = HashMap::from([
            (user_code.to_string(), AccessLevel::User),
            (admin_code.to_string(), AccessLevel::Admin),
        ]);
        Ok(Self { codes })
    }

    pub fn authenticate(&self, code: &str) -> Result<AccessLevel> {
        self.codes.get(code).copied().ok_or(Error::InvalidCode)
    }
}

impl Default for AccessGate {
    fn default() -> Self {
        let codes = HashMap::from([
            (DEFAULT_USER_CODE.to_string(), AccessLevel::User),
            (DEFAULT_ADMIN_CODE.to_string(), AccessLevel::Admin),
        ]);
        Self { codes }
    }
}

/// Access tier held for the lifetime of one session. Starts at `None` and
/// never returns to it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    level: AccessLevel,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> AccessLevel {
        self.level
    }

    pub fn is_admitted(&self) -> bool {
        self.level != AccessLevel::None
    }

    /// Admits the session on a matching code. An already admitted session
    /// keeps its tier; a failed attempt leaves the session unchanged.
    pub fn admit(&mut self, gate: &AccessGate, code: &str) -> Result<AccessLevel> {
        if self.is_admitted() {
            return Ok(self.level);
        }

        match gate.authenticate(code) {
            Ok(level) => {
                tracing::info!(%level, "session admitted");
                self.level = level;
                Ok(level)
            }
            Err(err) => {
                tracing::warn!("access code rejected");
                Err(err)
            }
        }
    }

    pub fn require(&self, level: AccessLevel) -> Result<()> {
        if self.level >= level && self.is_admitted() {
            Ok(())
        } else {
            Err(Error::PermissionDenied(level))
        }
    }
}
