//! Closed set of known catalog formats and their per-format settings.
//!
//! Each supplier PDF family has its own table conventions; dispatch happens
//! once, on the file name, and everything downstream reads the resulting
//! config instead of re-inspecting the name.

use serde::Serialize;

/// How a catalog lays out its product tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TableLayout {
    /// One product per row, columns named by the header.
    RowWise,
    /// One product per column, spec names in the first column.
    Transposed,
    /// Column headers are themselves SKUs, body cells are `x` marks.
    HeaderAsSku,
}

/// Known catalog families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CatalogKind {
    PressurePipes,
    DrainPipes,
    WellPumps,
    SubmersiblePumps,
    PistonPumps,
    CentrifugalPumps,
    PumpSpecials,
    DriveTech,
    AirPipes,
    PePipes,
    Compressors,
    PressureCleaners,
    PowerTools,
    BrassFittings,
    StainlessFittings,
    BlackFittings,
    GalvanizedPipes,
    HoseCouplings,
    HoseClamps,
    Generic,
}

impl CatalogKind {
    /// Detect the catalog family from a (lowercased) file name.
    pub fn detect(file_name: &str) -> CatalogKind {
        let name = file_name.to_lowercase();
        let table: &[(&str, CatalogKind)] = &[
            ("drukbuizen", CatalogKind::PressurePipes),
            ("kunststof-afvoerleidingen", CatalogKind::DrainPipes),
            ("bronpompen", CatalogKind::WellPumps),
            ("dompelpompen", CatalogKind::SubmersiblePumps),
            ("zuigerpompen", CatalogKind::PistonPumps),
            ("centrifugaalpompen", CatalogKind::CentrifugalPumps),
            ("pomp-specials", CatalogKind::PumpSpecials),
            ("aandrijftechniek", CatalogKind::DriveTech),
            ("abs-persluchtbuizen", CatalogKind::AirPipes),
            ("pe-buizen", CatalogKind::PePipes),
            ("airpress", CatalogKind::Compressors),
            ("kranzle", CatalogKind::PressureCleaners),
            ("makita", CatalogKind::PowerTools),
            ("messing-draadfittingen", CatalogKind::BrassFittings),
            ("rvs-draadfittingen", CatalogKind::StainlessFittings),
            ("zwarte-draad-en-lasfittingen", CatalogKind::BlackFittings),
            ("verzinkte-buizen", CatalogKind::GalvanizedPipes),
            ("slangkoppelingen", CatalogKind::HoseCouplings),
            ("slangklemmen", CatalogKind::HoseClamps),
        ];
        table
            .iter()
            .find(|(needle, _)| name.contains(needle))
            .map(|(_, kind)| *kind)
            .unwrap_or(CatalogKind::Generic)
    }

    /// Output category name for records of this family.
    pub fn category(&self) -> &'static str {
        use CatalogKind::*;
        match self {
            PressurePipes => "pressure-pipes",
            DrainPipes => "drain-pipes",
            WellPumps => "well-pumps",
            SubmersiblePumps => "submersible-pumps",
            PistonPumps => "piston-pumps",
            CentrifugalPumps => "centrifugal-pumps",
            PumpSpecials => "pump-specials",
            DriveTech => "drive-tech",
            AirPipes => "air-pipes",
            PePipes => "pe-pipes",
            Compressors => "compressors",
            PressureCleaners => "pressure-cleaners",
            PowerTools => "power-tools",
            BrassFittings => "brass-fittings",
            StainlessFittings => "stainless-fittings",
            BlackFittings => "black-fittings",
            GalvanizedPipes => "galvanized-pipes",
            HoseCouplings => "hose-couplings",
            HoseClamps => "hose-clamps",
            Generic => "generic",
        }
    }

    /// Fitting catalogs print two independent product columns per page.
    pub fn uses_column_split(&self) -> bool {
        matches!(
            self,
            CatalogKind::BrassFittings
                | CatalogKind::StainlessFittings
                | CatalogKind::BlackFittings
                | CatalogKind::GalvanizedPipes
                | CatalogKind::HoseCouplings
                | CatalogKind::HoseClamps
        )
    }
}

/// Per-family settings consulted by the driver.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub kind: CatalogKind,
    pub layout: TableLayout,
    /// 1-based page numbers to skip (covers, indexes).
    pub skip_pages: &'static [usize],
    /// Field the family uses for its order code.
    pub sku_field: &'static str,
    pub extract_images: bool,
    pub detect_series: bool,
    /// Brand stamped on every record, when the catalog is single-brand.
    pub brand: Option<&'static str>,
}

impl CatalogConfig {
    pub fn for_kind(kind: CatalogKind) -> CatalogConfig {
        use CatalogKind::*;
        let mut cfg = CatalogConfig {
            kind,
            layout: TableLayout::RowWise,
            skip_pages: &[],
            sku_field: "bestelnr",
            extract_images: false,
            detect_series: false,
            brand: None,
        };
        match kind {
            PressureCleaners => {
                cfg.layout = TableLayout::Transposed;
                cfg.skip_pages = &[1];
                cfg.sku_field = "article_nr";
                cfg.extract_images = true;
            }
            PowerTools => {
                cfg.layout = TableLayout::Transposed;
                cfg.skip_pages = &[1];
                cfg.sku_field = "model";
                cfg.extract_images = true;
                cfg.brand = Some("Makita");
            }
            Compressors => {
                cfg.skip_pages = &[1, 2];
                cfg.sku_field = "article_sku";
                cfg.extract_images = true;
            }
            DriveTech => {
                cfg.sku_field = "code";
            }
            HoseClamps => {
                cfg.layout = TableLayout::HeaderAsSku;
                cfg.extract_images = true;
                cfg.detect_series = true;
            }
            BrassFittings | StainlessFittings | BlackFittings | GalvanizedPipes
            | HoseCouplings => {
                cfg.extract_images = true;
                cfg.detect_series = true;
            }
            PressurePipes | DrainPipes | WellPumps | SubmersiblePumps | PistonPumps
            | CentrifugalPumps | PumpSpecials | AirPipes | PePipes => {
                cfg.extract_images = true;
                cfg.detect_series = true;
            }
            Generic => {}
        }
        cfg
    }

    pub fn for_file(file_name: &str) -> CatalogConfig {
        Self::for_kind(CatalogKind::detect(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_known_kinds() {
        assert_eq!(
            CatalogKind::detect("dema-drukbuizen-2024.pdf"),
            CatalogKind::PressurePipes
        );
        assert_eq!(
            CatalogKind::detect("Makita-Catalogus.PDF"),
            CatalogKind::PowerTools
        );
        assert_eq!(
            CatalogKind::detect("unknown-supplier.pdf"),
            CatalogKind::Generic
        );
    }

    #[test]
    fn test_transposed_layouts() {
        assert_eq!(
            CatalogConfig::for_kind(CatalogKind::PressureCleaners).layout,
            TableLayout::Transposed
        );
        assert_eq!(
            CatalogConfig::for_kind(CatalogKind::WellPumps).layout,
            TableLayout::RowWise
        );
    }

    #[test]
    fn test_fittings_use_column_split() {
        assert!(CatalogKind::BrassFittings.uses_column_split());
        assert!(!CatalogKind::WellPumps.uses_column_split());
    }
}
