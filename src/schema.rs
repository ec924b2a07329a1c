use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Untyped extraction result as returned by the model: field name to any
/// JSON value. Nothing about its shape is guaranteed.
pub type RawExtraction = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItem {
    RentalIncome,
    LaundryIncome,
    ParkingIncome,
    OtherRevenue,
    ApplicationFees,
    TotalRevenue,
    RepairsMaintenance,
    Utilities,
    PropertyManagementFees,
    PropertyTaxes,
    Insurance,
    AdminOfficeCosts,
    MarketingAdvertising,
    TotalExpenses,
    NetOperatingIncome,
}

impl LineItem {
    pub const ALL: [LineItem; 15] = [
        LineItem::RentalIncome,
        LineItem::LaundryIncome,
        LineItem::ParkingIncome,
        LineItem::OtherRevenue,
        LineItem::ApplicationFees,
        LineItem::TotalRevenue,
        LineItem::RepairsMaintenance,
        LineItem::Utilities,
        LineItem::PropertyManagementFees,
        LineItem::PropertyTaxes,
        LineItem::Insurance,
        LineItem::AdminOfficeCosts,
        LineItem::MarketingAdvertising,
        LineItem::TotalExpenses,
        LineItem::NetOperatingIncome,
    ];

    /// Items summed into `total_revenue`.
    pub const REVENUE_ITEMS: [LineItem; 5] = [
        LineItem::RentalIncome,
        LineItem::LaundryIncome,
        LineItem::ParkingIncome,
        LineItem::OtherRevenue,
        LineItem::ApplicationFees,
    ];

    /// Items summed into `total_expenses`.
    pub const EXPENSE_ITEMS: [LineItem; 7] = [
        LineItem::RepairsMaintenance,
        LineItem::Utilities,
        LineItem::PropertyManagementFees,
        LineItem::PropertyTaxes,
        LineItem::Insurance,
        LineItem::AdminOfficeCosts,
        LineItem::MarketingAdvertising,
    ];

    pub fn key(self) -> &'static str {
        match self {
            LineItem::RentalIncome => "rental_income",
            LineItem::LaundryIncome => "laundry_income",
            LineItem::ParkingIncome => "parking_income",
            LineItem::OtherRevenue => "other_revenue",
            LineItem::ApplicationFees => "application_fees",
            LineItem::TotalRevenue => "total_revenue",
            LineItem::RepairsMaintenance => "repairs_maintenance",
            LineItem::Utilities => "utilities",
            LineItem::PropertyManagementFees => "property_management_fees",
            LineItem::PropertyTaxes => "property_taxes",
            LineItem::Insurance => "insurance",
            LineItem::AdminOfficeCosts => "admin_office_costs",
            LineItem::MarketingAdvertising => "marketing_advertising",
            LineItem::TotalExpenses => "total_expenses",
            LineItem::NetOperatingIncome => "net_operating_income",
        }
    }
}

/// Fixed-schema statement for one document, after coercion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinancialRecord {
    #[schemars(description = "Primary income from unit rentals (Rent Income, Rental Revenue)")]
    pub rental_income: f64,

    #[schemars(description = "Income from laundry facilities or vending machines")]
    pub laundry_income: f64,

    #[schemars(description = "Revenue from parking spaces or garages")]
    pub parking_income: f64,

    #[schemars(description = "Any additional income: late fees, pet fees and similar")]
    pub other_revenue: f64,

    #[serde(default)]
    #[schemars(description = "Application fees charged to prospective tenants, 0 if not reported separately")]
    pub application_fees: f64,

    #[schemars(description = "Total Revenue / Total Income / Gross Income as stated in the document")]
    pub total_revenue: f64,

    #[schemars(description = "Repairs, maintenance, cleaning, landscaping")]
    pub repairs_maintenance: f64,

    #[schemars(description = "Electricity, water, gas and other utilities")]
    pub utilities: f64,

    #[schemars(description = "Fees paid to the property manager")]
    pub property_management_fees: f64,

    #[schemars(description = "Real estate / property taxes")]
    pub property_taxes: f64,

    #[schemars(description = "Property insurance")]
    pub insurance: f64,

    #[schemars(description = "Office supplies, software, professional fees")]
    pub admin_office_costs: f64,

    #[schemars(description = "Advertising and marketing")]
    pub marketing_advertising: f64,

    #[schemars(description = "Total (Operating) Expenses as stated in the document")]
    pub total_expenses: f64,

    #[schemars(description = "Net Operating Income: Total Revenue minus Total Expenses")]
    pub net_operating_income: f64,
}

impl FinancialRecord {
    pub fn get(&self, item: LineItem) -> f64 {
        match item {
            LineItem::RentalIncome => self.rental_income,
            LineItem::LaundryIncome => self.laundry_income,
            LineItem::ParkingIncome => self.parking_income,
            LineItem::OtherRevenue => self.other_revenue,
            LineItem::ApplicationFees => self.application_fees,
            LineItem::TotalRevenue => self.total_revenue,
            LineItem::RepairsMaintenance => self.repairs_maintenance,
            LineItem::Utilities => self.utilities,
            LineItem::PropertyManagementFees => self.property_management_fees,
            LineItem::PropertyTaxes => self.property_taxes,
            LineItem::Insurance => self.insurance,
            LineItem::AdminOfficeCosts => self.admin_office_costs,
            LineItem::MarketingAdvertising => self.marketing_advertising,
            LineItem::TotalExpenses => self.total_expenses,
            LineItem::NetOperatingIncome => self.net_operating_income,
        }
    }

    pub fn get_mut(&mut self, item: LineItem) -> &mut f64 {
        match item {
            LineItem::RentalIncome => &mut self.rental_income,
            LineItem::LaundryIncome => &mut self.laundry_income,
            LineItem::ParkingIncome => &mut self.parking_income,
            LineItem::OtherRevenue => &mut self.other_revenue,
            LineItem::ApplicationFees => &mut self.application_fees,
            LineItem::TotalRevenue => &mut self.total_revenue,
            LineItem::RepairsMaintenance => &mut self.repairs_maintenance,
            LineItem::Utilities => &mut self.utilities,
            LineItem::PropertyManagementFees => &mut self.property_management_fees,
            LineItem::PropertyTaxes => &mut self.property_taxes,
            LineItem::Insurance => &mut self.insurance,
            LineItem::AdminOfficeCosts => &mut self.admin_office_costs,
            LineItem::MarketingAdvertising => &mut self.marketing_advertising,
            LineItem::TotalExpenses => &mut self.total_expenses,
            LineItem::NetOperatingIncome => &mut self.net_operating_income,
        }
    }

    pub fn set(&mut self, item: LineItem, value: f64) {
        *self.get_mut(item) = value;
    }

    pub fn itemized_revenue(&self) -> f64 {
        LineItem::REVENUE_ITEMS.iter().map(|&i| self.get(i)).sum()
    }

    pub fn itemized_expenses(&self) -> f64 {
        LineItem::EXPENSE_ITEMS.iter().map(|&i| self.get(i)).sum()
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(FinancialRecord)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// The three figures every comparison works from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub revenue: f64,
    pub expense: f64,
    pub noi: f64,
}

/// Rent-roll style metrics used by the six-metric comparison mode.
///
/// Fields are optional because most statements don't report them; a value
/// that was never extracted stays `None` rather than becoming 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailedMetrics {
    pub gpr: Option<f64>,
    pub vacancy_loss: Option<f64>,
    pub other_income: Option<f64>,
    pub egi: Option<f64>,
    pub opex: Option<f64>,
    pub noi: Option<f64>,
}

impl DetailedMetrics {
    pub fn is_complete(&self) -> bool {
        self.gpr.is_some()
            && self.vacancy_loss.is_some()
            && self.other_income.is_some()
            && self.egi.is_some()
            && self.opex.is_some()
            && self.noi.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == DetailedMetrics::default()
    }
}

/// What a filled period slot holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodData {
    pub summary: PeriodSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<DetailedMetrics>,
}

impl PeriodData {
    pub fn summary(summary: PeriodSummary) -> Self {
        Self {
            summary,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: DetailedMetrics) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Detail that can take part in a six-metric comparison.
    pub fn complete_detail(&self) -> Option<&DetailedMetrics> {
        self.detail.as_ref().filter(|d| d.is_complete())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = FinancialRecord::schema_as_json().unwrap();
        for item in LineItem::ALL {
            assert!(schema_json.contains(item.key()), "missing {}", item.key());
        }
    }

    #[test]
    fn test_line_item_keys_match_serde_names() {
        for item in LineItem::ALL {
            let json = serde_json::to_string(&item).unwrap();
            assert_eq!(json, format!("\"{}\"", item.key()));
        }
    }

    #[test]
    fn test_get_and_set_cover_every_field() {
        let mut record = FinancialRecord::default();
        for (idx, item) in LineItem::ALL.iter().enumerate() {
            record.set(*item, idx as f64 + 1.0);
        }

        let value = serde_json::to_value(&record).unwrap();
        for (idx, item) in LineItem::ALL.iter().enumerate() {
            assert_eq!(value[item.key()].as_f64(), Some(idx as f64 + 1.0));
            assert_eq!(record.get(*item), idx as f64 + 1.0);
        }
    }

    #[test]
    fn test_itemized_sums() {
        let record = FinancialRecord {
            rental_income: 100.0,
            laundry_income: 10.0,
            application_fees: 5.0,
            utilities: 20.0,
            insurance: 7.5,
            total_revenue: 999.0,
            ..Default::default()
        };
        assert_eq!(record.itemized_revenue(), 115.0);
        assert_eq!(record.itemized_expenses(), 27.5);
    }

    #[test]
    fn test_detailed_metrics_completeness() {
        let mut detail = DetailedMetrics {
            gpr: Some(100.0),
            vacancy_loss: Some(5.0),
            other_income: Some(2.0),
            egi: Some(97.0),
            opex: Some(40.0),
            noi: None,
        };
        assert!(!detail.is_complete());
        assert!(PeriodData::default().with_detail(detail).complete_detail().is_none());

        detail.noi = Some(57.0);
        assert!(detail.is_complete());
        assert!(!detail.is_empty());
        assert!(DetailedMetrics::default().is_empty());
    }
}
