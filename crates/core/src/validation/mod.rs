mod rules;

use crate::invoice::InvoiceDraft;
use chrono::NaiveDate;

pub use rules::{price_warnings, MAX_SIGNIFICANT_DIGITS};

/// Checks that block issuing. Malformed prices are not among them; see
/// [`price_warnings`].
pub fn validate(draft: &InvoiceDraft, issued_on: NaiveDate) -> Result<(), Vec<String>> {
    let mut errs = Vec::new();
    if let Err(mut re) = rules::vat_checks(draft) {
        errs.append(&mut re);
    }
    if let Err(e) = rules::due_date_check(draft, issued_on) {
        errs.push(e);
    }
    if let Err(mut re) = rules::amount_precision_checks(draft) {
        errs.append(&mut re);
    }
    if errs.is_empty() {
        Ok(())
    } else {
        Err(errs)
    }
}
