//! Budget tracking with tiered graceful degradation.
//!
//! A run's resource budget is a single pool of abstract units. As usage
//! grows, the [`BudgetManager`] moves through four tiers, each stricter
//! than the last. Tier changes are signalled to the orchestrator over a
//! channel; crossing into the emergency tier also trips a cancellation
//! token so dispatch stops without interrupting in-flight work.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::wlog_debug;

/// Budget tiers, ordered from full capacity down to emergency.
///
/// The tier is derived from the fraction of the budget still remaining:
/// more than 67% remaining is Tier1, more than 33% is Tier2, more than
/// 13% is Tier3, anything below that is Tier4.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum Tier {
    #[default]
    Tier1,
    Tier2,
    Tier3,
    Tier4,
}

impl Tier {
    fn for_remaining_fraction(fraction: f64) -> Self {
        if fraction > 0.67 {
            Tier::Tier1
        } else if fraction > 0.33 {
            Tier::Tier2
        } else if fraction > 0.13 {
            Tier::Tier3
        } else {
            Tier::Tier4
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Tier1 => "Tier1",
            Tier::Tier2 => "Tier2",
            Tier::Tier3 => "Tier3",
            Tier::Tier4 => "Tier4",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Events emitted by the budget manager as the run consumes resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetEvent {
    /// The run crossed a tier boundary. Tiers only ever get stricter.
    TierChanged { from: Tier, to: Tier },
    /// A charge was refused because it would exceed the total budget.
    ChargeRefused { requested: u64, remaining: u64 },
}

/// Tracks cumulative usage against a fixed total and reports the current
/// degradation tier. Tier transitions are monotone within a run.
pub struct BudgetManager {
    total: u64,
    used: u64,
    tier: Tier,
    events: mpsc::UnboundedSender<BudgetEvent>,
    emergency: CancellationToken,
}

impl BudgetManager {
    /// Create a manager for a run with the given total budget. Returns the
    /// manager plus the receiving end of its event channel.
    pub fn new(total: u64) -> (Self, mpsc::UnboundedReceiver<BudgetEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                total,
                used: 0,
                tier: Tier::Tier1,
                events: tx,
                emergency: CancellationToken::new(),
            },
            rx,
        )
    }

    /// Charge `amount` units against the budget. Returns false if the
    /// charge would exceed the total; refused charges still trigger a
    /// downgrade signal so the orchestrator can shed scope.
    pub fn charge(&mut self, amount: u64) -> bool {
        if self.used + amount > self.total {
            let remaining = self.total - self.used;
            wlog_debug!(
                "Budget charge refused: requested={}, remaining={}",
                amount,
                remaining
            );
            let _ = self.events.send(BudgetEvent::ChargeRefused {
                requested: amount,
                remaining,
            });
            // Treat the pool as exhausted for tier purposes.
            self.used = self.total;
            self.update_tier();
            return false;
        }
        self.used += amount;
        self.update_tier();
        true
    }

    fn update_tier(&mut self) {
        let fraction = if self.total == 0 {
            0.0
        } else {
            (self.total - self.used) as f64 / self.total as f64
        };
        let next = Tier::for_remaining_fraction(fraction);
        // Never upgrade within a run.
        if next > self.tier {
            let from = self.tier;
            self.tier = next;
            wlog_debug!("Budget tier downgrade: {} -> {}", from, next);
            let _ = self.events.send(BudgetEvent::TierChanged { from, to: next });
            if next == Tier::Tier4 {
                self.emergency.cancel();
            }
        }
    }

    pub fn current_tier(&self) -> Tier {
        self.tier
    }

    pub fn usage(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.total - self.used
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Token cancelled once the emergency tier is reached. Dispatch loops
    /// check it before launching new invocations.
    pub fn emergency_token(&self) -> CancellationToken {
        self.emergency.clone()
    }
}
