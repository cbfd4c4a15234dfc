//! Result Dispatcher
//!
//! Forwards each accepted result once into every registered route. Each
//! route gets its own copy; a full route drops that copy and logs a warning
//! without affecting the others.

use crate::pipeline::channel::Sender;
use crate::recognition::RecognitionResult;
use serde::Serialize;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Results handed to the dispatcher
    pub dispatched: u64,
    /// Copies accepted by a route
    pub delivered: u64,
    /// Copies dropped on a full route
    pub dropped: u64,
}

#[derive(Default)]
pub struct Dispatcher {
    routes: Vec<Sender<RecognitionResult>>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, route: Sender<RecognitionResult>) {
        self.routes.push(route);
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Hand `result` to every route. Returns the number of routes that took it.
    pub fn dispatch(&mut self, result: RecognitionResult) -> usize {
        self.stats.dispatched += 1;
        let mut delivered = 0;

        let Some((last, rest)) = self.routes.split_last_mut() else {
            warn!(gesture = %result.name, "No output routes; result discarded");
            return 0;
        };

        for route in rest.iter_mut() {
            delivered += usize::from(Self::send(route, result.clone(), &mut self.stats));
        }
        delivered += usize::from(Self::send(last, result, &mut self.stats));

        delivered
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    fn send(
        route: &mut Sender<RecognitionResult>,
        result: RecognitionResult,
        stats: &mut DispatchStats,
    ) -> bool {
        match route.try_send(result) {
            Ok(()) => {
                stats.delivered += 1;
                trace!(route = route.name(), "Result dispatched");
                true
            }
            Err(rejected) => {
                stats.dropped += 1;
                warn!(
                    route = route.name(),
                    gesture = %rejected.name,
                    "Result dropped (route full)"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.routes.iter().map(|r| r.name()).collect();
        f.debug_struct("Dispatcher")
            .field("routes", &names)
            .field("stats", &self.stats)
            .finish()
    }
}
