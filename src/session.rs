use anyhow::Result;
use tracing::{info, warn};

use crate::db::Database;

const TOKEN_KEY: &str = "token";

pub struct Session<'a> {
    db: &'a Database,
}

impl<'a> Session<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn token(&self) -> Option<String> {
        match self.db.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "could not read session token");
                None
            }
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.token().is_some()
    }

    pub fn store(&self, token: &str) -> Result<()> {
        self.db.set(TOKEN_KEY, token)?;
        info!("session token stored");
        Ok(())
    }

    pub fn invalidate(&self) {
        if let Err(e) = self.db.remove(TOKEN_KEY) {
            warn!(error = %e, "could not clear session token");
        } else {
            info!("session token cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_invalidate() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(&db);
        assert!(!session.is_logged_in());

        session.store("jwt-1").unwrap();
        assert_eq!(session.token().as_deref(), Some("jwt-1"));

        session.invalidate();
        assert_eq!(session.token(), None);
    }

    #[test]
    fn test_empty_token_is_logged_out() {
        let db = Database::open_in_memory().unwrap();
        db.set("token", "").unwrap();
        assert!(!Session::new(&db).is_logged_in());
    }
}
