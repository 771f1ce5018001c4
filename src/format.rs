//! Telegram HTML texts for price, cap and liquidity notifications

use crate::timespan::format_time_ago;
use crate::types::{calc_percent_change, CapInfo, PriceReport, StakeDayGraphPoint, StakePoolReport};
use chrono::DateTime;

/// Dollar amount with precision chosen by magnitude
pub fn pretty_dollar(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1_000_000_000.0 {
        format!("${:.2}B", value / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("${:.2}M", value / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("${:.1}K", value / 1_000.0)
    } else if abs >= 1.0 {
        format!("${:.4}", value)
    } else if abs >= 0.01 {
        format!("${:.6}", value)
    } else {
        format!("${:.8}", value)
    }
}

/// Token amount with thousands separators
pub fn pretty_amount(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0 {
        out.insert(0, '-');
    }
    out
}

/// Signed percent, e.g. `+6.00%`
pub fn pretty_percent(value: f64) -> String {
    format!("{:+.2}%", value)
}

fn change_line(label: &str, old: f64, now: f64) -> String {
    if old > 0.0 {
        format!("{}: {}", label, pretty_percent(calc_percent_change(old, now)))
    } else {
        format!("{}: n/a", label)
    }
}

/// Price table; `ath` switches the headline to the new-high wording
pub fn price_change_text(report: &PriceReport, ath: bool) -> String {
    let fp = &report.fair_price;
    let price = fp.real_price;
    let mut lines = Vec::new();

    if ath {
        lines.push(format!("🚀 <b>New all-time high: {}</b>", pretty_dollar(price)));
    } else {
        lines.push(format!("<b>RUNE price is {} now</b>", pretty_dollar(price)));
        lines.push(format!(
            "Last ATH was {} ({})",
            pretty_dollar(report.last_ath.ath_price),
            format_time_ago(report.last_ath.ath_date)
        ));
    }

    lines.push(String::new());
    lines.push(change_line("1h", report.history.price_1h, price));
    lines.push(change_line("24h", report.history.price_24h, price));
    lines.push(change_line("7d", report.history.price_7d, price));
    lines.push(String::new());

    let rank = if fp.rank > 0 {
        format!(" (#{})", fp.rank)
    } else {
        String::new()
    };
    lines.push(format!("Market cap: <b>{}</b>{}", pretty_dollar(fp.market_cap()), rank));
    lines.push(format!("Total locked value: <b>{}</b>", pretty_dollar(fp.tlv_usd)));

    if fp.fair_price > 0.0 {
        lines.push(format!(
            "Deterministic price: <b>{}</b> (speculative multiplier x{:.2})",
            pretty_dollar(fp.fair_price),
            price / fp.fair_price
        ));
    }

    lines.join("\n")
}

pub fn cap_change_text(old: &CapInfo, new: &CapInfo) -> String {
    let verb = if new.cap > old.cap { "raised" } else { "dropped" };
    let filled = if new.cap > 0 {
        new.stacked as f64 / new.cap as f64 * 100.0
    } else {
        0.0
    };

    [
        format!("<b>Pool cap {}</b> from {} to {} RUNE", verb, pretty_amount(old.cap as f64), pretty_amount(new.cap as f64)),
        format!(
            "Staked: {} RUNE ({:.1}% of the cap)",
            pretty_amount(new.stacked as f64),
            filled
        ),
        format!(
            "Room left: {} RUNE ≈ {}",
            pretty_amount((new.cap - new.stacked).max(0) as f64),
            pretty_dollar((new.cap - new.stacked).max(0) as f64 * new.price)
        ),
        format!("RUNE price: {}", pretty_dollar(new.price)),
    ]
    .join("\n")
}

/// Per-pool liquidity report with an optional weekly chart
pub fn pool_report_text(report: &StakePoolReport, weekly: Option<&[StakeDayGraphPoint]>) -> String {
    let liq = &report.liquidity;
    let (rune, asset) = report.redeemable();
    let since = DateTime::from_timestamp(liq.first_stake_ts, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut lines = vec![
        format!("<b>{}</b> (since {})", liq.pool, since),
        format!("Redeemable: {:.2} RUNE + {:.4} asset", rune, asset),
        format!("Value now: <b>{}</b>", pretty_dollar(report.current_value_usd())),
    ];

    match (report.initial_value_usd(), report.gain_percent()) {
        (Some(initial), Some(gain)) => {
            lines.push(format!("Value staked: {}", pretty_dollar(initial)));
            lines.push(format!("Gain: <b>{}</b>", pretty_percent(gain)));
        }
        _ => lines.push("Value staked: unknown".to_string()),
    }

    if let Some(points) = weekly {
        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            lines.push(format!(
                "Week: {} → {}",
                pretty_dollar(first.usd_value),
                pretty_dollar(last.usd_value)
            ));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FairPrice, HistoricalPrices, PriceAth};

    #[test]
    fn test_pretty_helpers() {
        assert_eq!(pretty_dollar(1.06), "$1.0600");
        assert_eq!(pretty_dollar(530_000_000.0), "$530.00M");
        assert_eq!(pretty_dollar(0.05), "$0.050000");
        assert_eq!(pretty_amount(1_234_567.4), "1,234,567");
        assert_eq!(pretty_amount(-1_000.0), "-1,000");
        assert_eq!(pretty_amount(999.0), "999");
        assert_eq!(pretty_percent(6.0), "+6.00%");
        assert_eq!(pretty_percent(-2.5), "-2.50%");
    }

    fn report(price_1h: f64) -> PriceReport {
        PriceReport {
            history: HistoricalPrices {
                price_1h,
                price_24h: 0.0,
                price_7d: 2.12,
            },
            fair_price: FairPrice {
                real_price: 1.06,
                fair_price: 0.53,
                rank: 42,
                ..FairPrice::default()
            },
            last_ath: PriceAth::default(),
        }
    }

    #[test]
    fn test_price_table() {
        let text = price_change_text(&report(1.0), false);
        assert!(text.contains("RUNE price is $1.0600 now"));
        assert!(text.contains("1h: +6.00%"));
        assert!(text.contains("24h: n/a"));
        assert!(text.contains("7d: -50.00%"));
        assert!(text.contains("(#42)"));
        assert!(text.contains("x2.00"));
    }

    #[test]
    fn test_ath_headline() {
        let text = price_change_text(&report(1.0), true);
        assert!(text.contains("New all-time high"));
        assert!(!text.contains("Last ATH"));
    }

    #[test]
    fn test_cap_change() {
        let text = cap_change_text(&CapInfo::new(100, 80, 1.0), &CapInfo::new(150, 90, 2.0));
        assert!(text.contains("raised from 100 to 150"));
        assert!(text.contains("60.0% of the cap"));
        assert!(text.contains("Room left: 60 RUNE"));
    }
}
