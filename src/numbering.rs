use crate::log::InvoiceLog;

/// Next number after the last one in `log`. Never fails: a missing log, an unreadable log, a log
/// without numbers and a malformed last number all yield the seed, e.g. `KAM001`.
pub fn next_invoice_number(log: &dyn InvoiceLog, prefix: &str) -> String {
    let seed = format_invoice_number(prefix, 1);

    let numbers = match log.invoice_numbers() {
        Ok(numbers) => numbers,
        Err(e) => {
            tracing::debug!(error = %e, "invoice log unreadable, using seed number");
            return seed;
        }
    };

    let Some(last) = numbers.last() else {
        tracing::debug!("invoice log has no invoice numbers, using seed number");
        return seed;
    };

    increment_invoice_number(last, prefix).unwrap_or_else(|| {
        tracing::debug!(last = %last, "last invoice number is malformed, using seed number");
        seed
    })
}

/// `KAM007` -> `KAM008`. `None` when `last` does not carry `prefix` followed by digits.
pub fn increment_invoice_number(last: &str, prefix: &str) -> Option<String> {
    let digits = last.trim().strip_prefix(prefix)?.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u64 = digits.parse().ok()?;
    Some(format_invoice_number(prefix, n.checked_add(1)?))
}

pub fn format_invoice_number(prefix: &str, next: u64) -> String {
    format!("{}{:03}", prefix, next)
}
