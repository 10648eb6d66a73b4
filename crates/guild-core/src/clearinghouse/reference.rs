//! Human-readable order references.
//!
//! ```text
//! ORDER#<unix>+<n>|<username>:<golem>|<TYPE><qty><item>@<price>[*]
//! ```
//!
//! `<n>` disambiguates orders spooled in the same wall-clock second and a
//! trailing `*` marks forced execution. The clearinghouse never parses
//! references to find an order's owner; parsing exists for clients that
//! hold only the string.

use core::fmt;
use core::str::FromStr;

use guild_types::{Order, OrderType};

const PREFIX: &str = "ORDER#";

/// Error returned when a string is not a well-formed order reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed order reference {reference:?}: {reason}")]
pub struct ReferenceError {
    /// The rejected input.
    pub reference: String,
    /// Which part failed to parse.
    pub reason: &'static str,
}

/// The structured form of an order reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReference {
    /// Unix seconds when the order was spooled.
    pub unix: i64,
    /// Sequence number within that second.
    pub sequence: u32,
    /// Owning user.
    pub username: String,
    /// Golem carrying the goods.
    pub golem_symbol: String,
    /// Kind of trade.
    pub order_type: OrderType,
    /// Units traded.
    pub quantity: u64,
    /// Item traded.
    pub item_symbol: String,
    /// Target unit price.
    pub target_price: u64,
    /// Forced execution flag.
    pub forced: bool,
}

impl OrderReference {
    /// Build the reference for `order`.
    pub fn new(unix: i64, sequence: u32, username: &str, golem_symbol: &str, order: &Order) -> Self {
        Self {
            unix,
            sequence,
            username: username.to_owned(),
            golem_symbol: golem_symbol.to_owned(),
            order_type: order.order_type,
            quantity: order.quantity,
            item_symbol: order.item_symbol.clone(),
            target_price: order.target_price,
            forced: order.force_execution,
        }
    }
}

impl fmt::Display for OrderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PREFIX}{}+{}|{}:{}|{}{}{}@{}",
            self.unix,
            self.sequence,
            self.username,
            self.golem_symbol,
            self.order_type,
            self.quantity,
            self.item_symbol,
            self.target_price
        )?;
        if self.forced {
            f.write_str("*")?;
        }
        Ok(())
    }
}

impl FromStr for OrderReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason| ReferenceError {
            reference: s.to_owned(),
            reason,
        };

        let body = s.strip_prefix(PREFIX).ok_or_else(|| fail("missing ORDER# prefix"))?;
        let (stamp, rest) = body.split_once('|').ok_or_else(|| fail("missing stamp"))?;
        let (owner, trade) = rest.rsplit_once('|').ok_or_else(|| fail("missing trade"))?;

        let (unix, sequence) = stamp.split_once('+').ok_or_else(|| fail("missing sequence"))?;
        let unix = unix.parse().ok().ok_or_else(|| fail("bad timestamp"))?;
        let sequence = sequence.parse().ok().ok_or_else(|| fail("bad sequence"))?;

        let (username, golem_symbol) = owner.rsplit_once(':').ok_or_else(|| fail("missing golem"))?;
        if username.is_empty() || golem_symbol.is_empty() {
            return Err(fail("empty owner"));
        }

        let (trade, forced) = trade
            .strip_suffix('*')
            .map_or((trade, false), |t| (t, true));
        let order_type = OrderType::Sell;
        let trade = trade
            .strip_prefix(order_type.as_str())
            .ok_or_else(|| fail("unknown order type"))?;
        let digits = trade
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| fail("missing item"))?;
        let (quantity, priced) = trade.split_at(digits);
        let quantity = quantity.parse().ok().ok_or_else(|| fail("bad quantity"))?;
        let (item_symbol, price) = priced.rsplit_once('@').ok_or_else(|| fail("missing price"))?;
        if item_symbol.is_empty() {
            return Err(fail("missing item"));
        }
        let target_price = price.parse().ok().ok_or_else(|| fail("bad price"))?;

        Ok(Self {
            unix,
            sequence,
            username: username.to_owned(),
            golem_symbol: golem_symbol.to_owned(),
            order_type,
            quantity,
            item_symbol: item_symbol.to_owned(),
            target_price,
            forced,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order(forced: bool) -> Order {
        Order {
            order_type: OrderType::Sell,
            market_symbol: "A-G-MARKET".to_owned(),
            item_symbol: "LOGS".to_owned(),
            quantity: 20,
            target_price: 45,
            force_execution: forced,
        }
    }

    #[test]
    fn formats_the_wire_shape() {
        let reference = OrderReference::new(1_700_000_000, 2, "ada", "MER-0", &order(false));
        assert_eq!(
            reference.to_string(),
            "ORDER#1700000000+2|ada:MER-0|SELL20LOGS@45"
        );
        let forced = OrderReference::new(1_700_000_000, 0, "ada", "MER-0", &order(true));
        assert!(forced.to_string().ends_with("@45*"));
    }

    #[test]
    fn parses_what_it_formats() {
        let reference = OrderReference::new(1_700_000_123, 7, "ada", "MER-10", &order(true));
        let parsed: Result<OrderReference, _> = reference.to_string().parse();
        assert_eq!(parsed, Ok(reference));
    }

    #[test]
    fn parses_hyphenated_items() {
        let parsed: OrderReference = "ORDER#5+0|bob:COU-1|SELL3IRON-ORE@100".parse().unwrap();
        assert_eq!(parsed.item_symbol, "IRON-ORE");
        assert_eq!(parsed.quantity, 3);
    }

    #[test]
    fn rejects_malformed_references() {
        for bad in [
            "",
            "ORDER#",
            "TRADE#1+0|ada:MER-0|SELL1LOGS@1",
            "ORDER#1|ada:MER-0|SELL1LOGS@1",
            "ORDER#1+0|adaMER-0|SELL1LOGS@1",
            "ORDER#1+0|ada:MER-0|BUY1LOGS@1",
            "ORDER#1+0|ada:MER-0|SELLLOGS@1",
            "ORDER#1+0|ada:MER-0|SELL1LOGS",
            "ORDER#1+0|ada:MER-0|SELL1@1",
            "ORDER#x+0|ada:MER-0|SELL1LOGS@1",
        ] {
            assert!(bad.parse::<OrderReference>().is_err(), "accepted {bad:?}");
        }
    }
}
