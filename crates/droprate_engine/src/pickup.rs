//! Pickup classification for drop confirmation.

/// Name token of the lunar coin pickup, which carries no coin value but is
/// still currency.
pub const LUNAR_COIN_TOKEN: &str = "PICKUP_LUNAR_COIN";

/// What the host reports when a pickup droplet lands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PickupInfo {
    /// Currency value of the pickup (0 for items and equipment).
    pub coin_value: u32,
    /// Localization token naming the pickup.
    pub name_token: String,
}

impl PickupInfo {
    /// Creates pickup info from its definition fields.
    #[must_use]
    pub fn new(coin_value: u32, name_token: impl Into<String>) -> Self {
        Self {
            coin_value,
            name_token: name_token.into(),
        }
    }

    /// Whether this pickup counts as a real item drop.
    #[must_use]
    pub fn is_real_item(&self) -> bool {
        self.coin_value == 0 && self.name_token != LUNAR_COIN_TOKEN
    }
}
