//! Demo data for trying out rules
//!
//! Generates a few months of realistic, uncategorized transactions. Raw bank
//! names are noisy ("SQ *BLUE BOTTLE"), some rows carry a cleaned merchant
//! name and a few carry a user note, so every search field gets exercised.

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{NewRule, Transaction};

/// Recurring monthly items: (day of month, cents, raw name, merchant)
const MONTHLY: &[(u32, i64, &str, Option<&str>)] = &[
    (1, 425000, "ACME CORP PAYROLL DIRECT DEPOSIT", None),
    (15, 425000, "ACME CORP PAYROLL DIRECT DEPOSIT", None),
    (5, -225000, "APARTMENT RENT PAYMENT", None),
    (10, -15000, "CITY UTILITIES - ELECTRIC", None),
    (10, -7500, "COMCAST CABLE COMM 800-266-2278", Some("Comcast")),
    (12, -1599, "NETFLIX.COM 866-579-7172 CA", Some("Netflix")),
    (18, -1099, "SPOTIFY USA 877-778-1161", Some("Spotify")),
    (22, -4500, "PLANET FITNESS CLUB FEES", Some("Planet Fitness")),
];

/// Everyday spending picked pseudo-randomly: (base cents, raw name, merchant)
const EVERYDAY: &[(i64, &str, Option<&str>)] = &[
    (-575, "SQ *BLUE BOTTLE COFFEE OAKLAND", Some("Blue Bottle Coffee")),
    (-645, "STARBUCKS STORE 04512", Some("Starbucks")),
    (-8743, "WHOLEFDS MKT 10234", Some("Whole Foods Market")),
    (-6421, "TRADER JOE S #552", Some("Trader Joe's")),
    (-2350, "UBER *TRIP HELP.UBER.COM", Some("Uber")),
    (-1875, "LYFT *RIDE SUN 6PM", Some("Lyft")),
    (-4800, "SHELL OIL 57444120", Some("Shell")),
    (-3299, "AMZN Mktp US*2K31L0TZ2", Some("Amazon")),
    (-4215, "CHIPOTLE 1432", Some("Chipotle")),
    (-2999, "TARGET 00012345", Some("Target")),
];

/// Free-text notes users attach to some transactions
const NOTES: &[&str] = &[
    "Birthday gift for Sam",
    "Team lunch, expensed",
    "Coffee with a client",
];

/// Starter rules matching the generated data
pub fn demo_rules() -> Vec<NewRule> {
    vec![
        NewRule::new(["payroll"], "income"),
        NewRule::new(["rent"], "housing"),
        NewRule::new(["utilities", "comcast"], "utilities"),
        NewRule::new(["netflix", "spotify"], "subscriptions"),
        NewRule::new(["coffee", "starbucks"], "coffee"),
        NewRule::new(["whole foods", "trader joe"], "groceries"),
        NewRule::new(["uber", "lyft"], "transport"),
        NewRule::new(["shell"], "fuel"),
        NewRule::new(["amazon", "target"], "shopping"),
        NewRule::new(["gift"], "gifts").with_description("Anything noted as a gift"),
        NewRule::new(["planet fitness"], "fitness").inactive(),
    ]
}

/// Generate `days` days of transactions ending at `today`
///
/// Output is deterministic for the same `today` and `days`, apart from ids.
pub fn generate_demo_transactions(today: NaiveDate, days: u32) -> Vec<Transaction> {
    let mut rng = SimpleRng::new(42);
    let mut transactions = Vec::new();

    for days_ago in 0..i64::from(days) {
        let date = today - Duration::days(days_ago);

        for (day, cents, name, merchant) in MONTHLY {
            if date.day() == *day {
                transactions.push(create_transaction(date, *cents, name, *merchant));
            }
        }

        // Zero to two everyday purchases per day
        let purchases = (rng.next() * 3.0) as usize;
        for _ in 0..purchases {
            let (base, name, merchant) = *rng.pick(EVERYDAY);
            // +/- 30% around the base amount
            let cents = (base as f64 * (0.7 + rng.next() * 0.6)).round() as i64;
            let mut tx = create_transaction(date, cents, name, merchant);
            if rng.next() < 0.05 {
                tx.user_description = Some(rng.pick(NOTES).to_string());
            }
            transactions.push(tx);
        }
    }

    transactions
}

fn create_transaction(
    date: NaiveDate,
    cents: i64,
    name: &str,
    merchant: Option<&str>,
) -> Transaction {
    let mut tx = Transaction::new(Uuid::new_v4(), name, Decimal::new(cents, 2), date);
    tx.merchant_name = merchant.map(str::to_string);
    tx
}

/// Simple deterministic random number generator (LCG)
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.state >> 32) as f64 / u32::MAX as f64
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[(self.next() * items.len() as f64) as usize % items.len()]
    }
}
