//! Built-in defaults: the standard landscaping service catalog and the
//! deployment's default business record.

use bigdecimal::BigDecimal;

use crate::invoice::{BusinessInfo, BusinessInfoBuilder, BusinessInfoBuilderError};

/// One preset entry in the service catalog.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub service: &'static str,
    pub description: &'static str,
    pub rate: i64,
}

impl CatalogEntry {
    pub fn rate(&self) -> BigDecimal {
        BigDecimal::from(self.rate)
    }
}

/// The default landscaping services offered, with their standard rates.
pub const DEFAULT_SERVICES: &[CatalogEntry] = &[
    CatalogEntry {
        service: "Lawn Maintanance",
        description: "Lawn Maintainance of all areas cleaning all common areas and spraying of weeds",
        rate: 180,
    },
    CatalogEntry {
        service: "Hedge Trimming",
        description: "Hedge and shrub trimming",
        rate: 85,
    },
    CatalogEntry {
        service: "Garden Clean Up",
        description: "General garden cleanup and waste removal",
        rate: 120,
    },
    CatalogEntry {
        service: "Mulching",
        description: "Mulch supply and spreading",
        rate: 95,
    },
    CatalogEntry {
        service: "Tree Pruning",
        description: "Tree pruning and shaping",
        rate: 150,
    },
    CatalogEntry {
        service: "Strata Maintenance",
        description: "Body corporate grounds maintenance",
        rate: 200,
    },
    CatalogEntry {
        service: "Weeding",
        description: "Garden bed weeding",
        rate: 55,
    },
    CatalogEntry {
        service: "Fertilizing",
        description: "Lawn and garden fertilization",
        rate: 75,
    },
    CatalogEntry {
        service: "Irrigation Repair",
        description: "Irrigation system repairs",
        rate: 90,
    },
    CatalogEntry {
        service: "Pressure Washing",
        description: "Driveway and path pressure cleaning",
        rate: 110,
    },
];

/// Look up a catalog entry by service name.
pub fn find_service(name: &str) -> Option<&'static CatalogEntry> {
    DEFAULT_SERVICES.iter().find(|entry| entry.service == name)
}

/// The business record used until one has been saved.
pub fn default_business_info() -> Result<BusinessInfo, BusinessInfoBuilderError> {
    BusinessInfoBuilder::default()
        .business_name("Mazzari Landscape Management")
        .email("info@mazzarilandscape.com.au")
        .phone("0400 000 000")
        .address("Sydney, NSW, Australia")
        .build()
}
