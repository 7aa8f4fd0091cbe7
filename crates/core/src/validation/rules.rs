use crate::invoice::{price_or_zero, InvoiceDraft};
use crate::parsing::parse_decimal;
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub fn vat_checks(draft: &InvoiceDraft) -> Result<(), Vec<String>> {
    let mut errs = Vec::new();

    match parse_decimal(&draft.vat) {
        None => errs.push(format!("VAT '{}' is not a number", draft.vat.trim())),
        Some(vat) if vat.is_sign_negative() || vat > Decimal::ONE_HUNDRED => {
            errs.push(format!("VAT {vat}% must be between 0 and 100"));
        }
        Some(_) => {}
    }

    if errs.is_empty() {
        Ok(())
    } else {
        Err(errs)
    }
}

pub fn due_date_check(draft: &InvoiceDraft, issued_on: NaiveDate) -> Result<(), String> {
    match draft.payment_due_date {
        Some(due) if due < issued_on => Err(format!(
            "Payment due date {due} lies before the issue date {issued_on}"
        )),
        _ => Ok(()),
    }
}

/// Amounts are carried as JSON numbers (f64) in the canonical form; beyond
/// this many significant digits the round trip is no longer exact.
pub const MAX_SIGNIFICANT_DIGITS: u32 = 15;

fn significant_digits(d: Decimal) -> u32 {
    let mantissa = d.normalize().mantissa().unsigned_abs();
    if mantissa == 0 {
        1
    } else {
        mantissa.ilog10() + 1
    }
}

pub fn amount_precision_checks(draft: &InvoiceDraft) -> Result<(), Vec<String>> {
    let errs: Vec<String> = [
        ("VAT", draft.vat_percent()),
        ("Total", draft.total_amount()),
        ("Total with VAT", draft.total_amount_with_vat()),
    ]
    .into_iter()
    .filter(|(_, value)| significant_digits(*value) > MAX_SIGNIFICANT_DIGITS)
    .map(|(label, value)| {
        format!("{label} {value} has more than {MAX_SIGNIFICANT_DIGITS} significant digits")
    })
    .collect();

    if errs.is_empty() {
        Ok(())
    } else {
        Err(errs)
    }
}

/// Line items whose price will count as 0.
pub fn price_warnings(draft: &InvoiceDraft) -> Vec<String> {
    draft
        .line_items
        .iter()
        .enumerate()
        .filter(|(_, item)| price_or_zero(&item.unit_price).is_zero())
        .filter(|(_, item)| parse_decimal(&item.unit_price) != Some(Decimal::ZERO))
        .map(|(i, item)| {
            format!(
                "Line item {} ('{}'): price '{}' is not a valid amount and counts as 0",
                i + 1,
                item.description,
                item.unit_price.trim()
            )
        })
        .collect()
}
