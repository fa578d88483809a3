//! The set of symbols a user follows.

use std::sync::Arc;

use tracing::info;

use crate::broadcast::{BroadcastHub, HubMessage};

/// Trim and upper-case a user-entered symbol. Empty input yields `None`.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_ascii_uppercase())
    }
}

/// Insertion-ordered list of normalized symbols.
///
/// Every change is followed by a `Snapshot` on the hub, if one is attached.
#[derive(Default)]
pub struct Watchlist {
    symbols: Vec<String>,
    hub: Option<Arc<BroadcastHub>>,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::new();
        for s in symbols {
            list.insert(s.as_ref());
        }
        list
    }

    pub fn with_hub(mut self, hub: Arc<BroadcastHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    fn insert(&mut self, raw: &str) -> Option<String> {
        let sym = normalize_symbol(raw)?;
        if self.symbols.contains(&sym) {
            return None;
        }
        self.symbols.push(sym.clone());
        Some(sym)
    }

    /// Add a symbol. Returns `false` if it was empty or already present.
    pub fn add(&mut self, raw: &str) -> bool {
        match self.insert(raw) {
            Some(sym) => {
                info!(symbol = %sym, "watching");
                self.announce();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, raw: &str) -> bool {
        let Some(sym) = normalize_symbol(raw) else {
            return false;
        };
        let before = self.symbols.len();
        self.symbols.retain(|s| *s != sym);
        let removed = self.symbols.len() < before;
        if removed {
            info!(symbol = %sym, "unwatched");
            self.announce();
        }
        removed
    }

    pub fn contains(&self, raw: &str) -> bool {
        normalize_symbol(raw).is_some_and(|sym| self.symbols.contains(&sym))
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The current list as a hub message.
    pub fn snapshot(&self) -> HubMessage {
        HubMessage::Snapshot {
            watchlist: self.symbols.clone(),
        }
    }

    fn announce(&self) {
        if let Some(hub) = &self.hub {
            hub.publish(&self.snapshot());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_and_dedups() {
        let mut wl = Watchlist::new();
        assert!(wl.add(" aapl "));
        assert!(!wl.add("AAPL"));
        assert!(!wl.add("   "));
        assert!(wl.add("msft"));
        assert_eq!(wl.symbols(), ["AAPL".to_string(), "MSFT".to_string()]);
        assert!(wl.contains("Aapl"));
    }

    #[test]
    fn remove_keeps_order() {
        let mut wl = Watchlist::from_symbols(["c", "a", "b"]);
        assert!(wl.remove("a"));
        assert!(!wl.remove("a"));
        assert_eq!(wl.symbols(), ["C".to_string(), "B".to_string()]);
    }

    #[test]
    fn changes_broadcast_snapshot() {
        let hub = Arc::new(BroadcastHub::new());
        let rx = hub.subscribe();
        let mut wl = Watchlist::new().with_hub(hub);

        wl.add("spy");
        wl.add("SPY");
        wl.remove("spy");

        let msgs: Vec<HubMessage> = rx.try_iter().collect();
        assert_eq!(
            msgs,
            vec![
                HubMessage::Snapshot {
                    watchlist: vec!["SPY".into()]
                },
                HubMessage::Snapshot { watchlist: vec![] },
            ]
        );
    }
}
