use std::io::Write;

use csv::WriterBuilder;
use engine::Transaction;
use serde::Serialize;

use crate::error::Result;

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CsvRow<'a> {
    date: &'a str,
    name: &'a str,
    amount: &'a str,
    paid: bool,
    payment_date: Option<String>,
    category: Option<&'a str>,
}

/// Writes `Date,Name,Amount,Paid,PaymentDate,Category` rows.
pub fn write_csv<W: Write>(mut w: W, transactions: &[Transaction]) -> Result<()> {
    let mut wrt = WriterBuilder::new().from_writer(&mut w);
    for tx in transactions {
        wrt.serialize(CsvRow {
            date: &tx.date,
            name: &tx.name,
            amount: &tx.amount,
            paid: tx.is_paid(),
            payment_date: tx.payment_date().map(|at| at.to_rfc3339()),
            category: tx.category_name(),
        })?;
    }
    wrt.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn writes_header_and_quotes_names() {
        let mut paid = Transaction::new("Jun 01, 2025", "Coffee, Tea & Co", "-4.50");
        paid.mark_paid(Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap());
        paid.assign_category("cat-fun", "Fun");
        let open = Transaction::new("Jun 02, 2025", "Rent", "-1200");

        let mut out = Vec::new();
        write_csv(&mut out, &[paid, open]).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Date,Name,Amount,Paid,PaymentDate,Category");
        assert_eq!(
            lines[1],
            "\"Jun 01, 2025\",\"Coffee, Tea & Co\",-4.50,true,2025-06-02T08:00:00+00:00,Fun"
        );
        assert_eq!(lines[2], "\"Jun 02, 2025\",Rent,-1200,false,,");
    }
}
