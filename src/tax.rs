use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxRates {
    pub pst: Decimal,
    pub gst: Decimal,
}

impl Default for TaxRates {
    fn default() -> Self {
        TaxRates {
            pst: Decimal::new(7, 2),
            gst: Decimal::new(5, 2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxSummary {
    pub subtotal: Decimal,
    pub pst: Decimal,
    pub gst: Decimal,
    pub total: Decimal,
}

impl TaxSummary {
    /// Exempt taxes are zero; the others are the rate times the subtotal, unrounded.
    pub fn compute(subtotal: Decimal, pst_exempt: bool, gst_exempt: bool, rates: TaxRates) -> TaxSummary {
        let pst = if pst_exempt { Decimal::ZERO } else { subtotal * rates.pst };
        let gst = if gst_exempt { Decimal::ZERO } else { subtotal * rates.gst };
        TaxSummary {
            subtotal,
            pst,
            gst,
            total: subtotal + pst + gst,
        }
    }
}
