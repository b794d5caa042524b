use std::{
    fs::File,
    future::{Future, pending},
    io::{self, BufWriter},
};

use chrono::{DateTime, NaiveDate, Utc};
use engine::{Collector, Engine, Ledger, Transaction};

use crate::{
    error::{AppError, Result},
    export,
    settings::Command,
};

pub async fn run<C: Collector, L: Ledger>(engine: &Engine<C, L>, command: Command) -> Result<()> {
    match command {
        Command::Refresh => {
            let outcome = engine
                .refresh_until(until_signal(tokio::signal::ctrl_c()))
                .await?;
            println!(
                "{} transactions ({} kept, {} new, {} gone)",
                outcome.transactions.len(),
                outcome.preserved,
                outcome.added,
                outcome.dropped
            );
        }
        Command::List => print_all(&engine.transactions().await),
        Command::Unpaid { limit } => {
            print_all(&engine.unpaid(limit).await);
            println!("total unpaid: {}", engine.total_unpaid().await?);
        }
        Command::Pay { ids } => {
            let paid = match ids.as_slice() {
                [id] => vec![engine.pay(*id).await?],
                _ => engine.submit_bill_payment(&ids).await?,
            };
            println!("paid {} transaction(s)", paid.len());
            print_all(&paid);
        }
        Command::PayAll => {
            let paid = engine.pay_all_unpaid().await?;
            println!("paid {} transaction(s)", paid.len());
        }
        Command::Categorize { id, category_id } => {
            let tx = engine.categorize(id, &category_id).await?;
            println!(
                "{} recorded under {}",
                tx.name,
                tx.category_name().unwrap_or(&category_id)
            );
        }
        Command::Categories => {
            for group in engine.categories().await? {
                println!("{}", group.name);
                for category in group.categories {
                    println!("  {}  {}", category.id, category.name);
                }
            }
        }
        Command::Delete { id } => {
            let tx = engine.delete(id).await?;
            println!("deleted {}", tx.name);
        }
        Command::MarkUnpaid { id } => {
            let tx = engine.mark_unpaid(id).await?;
            println!("{} is unpaid again", tx.name);
        }
        Command::SetPaymentDate { id, date } => {
            let at = parse_payment_date(&date)?;
            let tx = engine.set_payment_date(id, at).await?;
            print_all(&[tx]);
        }
        Command::Health => {
            engine.health().await?;
            println!("collector is up");
        }
        Command::Card => {
            let card = engine.card_info().await?;
            println!(
                "{} ****{}  balance {:.2}",
                card.card_name, card.last_four_digits, card.current_balance
            );
        }
        Command::Export { path } => {
            let transactions = engine.transactions().await;
            export::write_csv(BufWriter::new(File::create(&path)?), &transactions)?;
            println!("exported {} transaction(s) to {}", transactions.len(), path.display());
        }
    }
    Ok(())
}

/// Completes when `signal` fires. A signal that cannot be listened for never
/// completes, so the caller is not cancelled by mistake.
async fn until_signal<F: Future<Output = io::Result<()>>>(signal: F) {
    if let Err(err) = signal.await {
        tracing::warn!("cannot listen for Ctrl-C, refresh runs to completion: {err}");
        pending::<()>().await;
    }
}

fn print_all(transactions: &[Transaction]) {
    for tx in transactions {
        let status = match tx.payment_date() {
            Some(at) => format!("paid {}", at.format("%Y-%m-%d")),
            None => "unpaid".to_string(),
        };
        println!(
            "{}  {:<14} {:<30} {:>12}  {:<15} {}",
            tx.id(),
            tx.date,
            tx.name,
            tx.amount,
            status,
            tx.category_name().unwrap_or("-")
        );
    }
}

/// RFC 3339 timestamp, or a bare date taken as midnight UTC.
fn parse_payment_date(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
        .ok_or_else(|| AppError::InvalidArgument(format!("invalid payment date: {raw}")))
}

#[cfg(test)]
mod tests {
    use std::{future::ready, time::Duration};

    use chrono::TimeZone;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn unavailable_signal_never_cancels() {
        let waited = tokio::time::timeout(
            Duration::from_secs(60),
            until_signal(ready(Err(io::Error::other("no signal handler")))),
        )
        .await;
        assert!(waited.is_err());

        tokio::time::timeout(Duration::from_secs(60), until_signal(ready(Ok(()))))
            .await
            .unwrap();
    }

    #[test]
    fn payment_dates() {
        assert_eq!(
            parse_payment_date("2025-06-02").unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_payment_date("2025-06-02T10:00:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap()
        );
        assert!(matches!(
            parse_payment_date("02/06/2025"),
            Err(AppError::InvalidArgument(_))
        ));
    }
}
