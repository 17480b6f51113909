//! Server Selection Policies

use crate::config::DatabaseServer;
use crate::domain::ports::ServerSelector;
use rand::seq::SliceRandom;

/// Uniform random choice; any server is as good as another
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelector;

impl ServerSelector for RandomSelector {
    fn select<'a>(&self, servers: &'a [DatabaseServer]) -> Option<&'a DatabaseServer> {
        servers.choose(&mut rand::thread_rng())
    }
}

/// Always the server at `index`
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSelector(pub usize);

impl ServerSelector for FixedSelector {
    fn select<'a>(&self, servers: &'a [DatabaseServer]) -> Option<&'a DatabaseServer> {
        servers.get(self.0)
    }
}
