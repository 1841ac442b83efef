//! Export column vocabulary.
//!
//! Headers are matched after normalization: first line only, lowercased, with
//! whitespace, underscores, and hyphens removed. Each column accepts its English
//! names and the Chinese header used by the site exports.

use std::collections::HashMap;

use precom_core::ndt::NdtMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    DrawingNumber,
    WeldJoint,
    PageNumber,
    PipelineNumber,
    Revision,
    Contractor,
    SystemCode,
    SubsystemCode,
    TestPackage,
    WeldDate,
    Size,
    Result(NdtMethod),
}

impl Column {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DrawingNumber => "drawing_number",
            Self::WeldJoint => "weld_joint",
            Self::PageNumber => "page_number",
            Self::PipelineNumber => "pipeline_number",
            Self::Revision => "revision",
            Self::Contractor => "contractor",
            Self::SystemCode => "system_code",
            Self::SubsystemCode => "subsystem_code",
            Self::TestPackage => "test_package_id",
            Self::WeldDate => "weld_date",
            Self::Size => "size",
            Self::Result(method) => method.result_column(),
        }
    }

    fn aliases(self) -> Vec<String> {
        let fixed: &[&str] = match self {
            Self::DrawingNumber => &["图纸号", "DrawingNumber", "Drawing No", "Drawing"],
            Self::WeldJoint => &["焊缝编号", "WeldJoint", "Weld No", "Joint"],
            Self::PageNumber => &["页码", "PageNumber", "Page"],
            Self::PipelineNumber => &["管线号", "PipelineNumber", "Line Number", "Line No"],
            Self::Revision => &["版本号", "RevNo", "Revision", "Rev"],
            Self::Contractor => &["施工承包商", "ConstContractor", "Contractor"],
            Self::SystemCode => &["介质", "SystemCode", "System"],
            Self::SubsystemCode => &["子系统", "SubSystemCode", "Subsystem"],
            Self::TestPackage => &["试压包号", "TestPackageID", "Test Package", "TestPackage"],
            Self::WeldDate => &["焊接日期", "WeldDate"],
            Self::Size => &["尺寸", "Size", "DIN"],
            Self::Result(method) => {
                let label = method.label();
                return vec![
                    format!("{label}检测结果"),
                    format!("{label}Result"),
                    label.to_string(),
                ];
            }
        };
        fixed.iter().map(|alias| (*alias).to_string()).collect()
    }

    fn all() -> Vec<Self> {
        let mut columns = vec![
            Self::DrawingNumber,
            Self::WeldJoint,
            Self::PageNumber,
            Self::PipelineNumber,
            Self::Revision,
            Self::Contractor,
            Self::SystemCode,
            Self::SubsystemCode,
            Self::TestPackage,
            Self::WeldDate,
            Self::Size,
        ];
        columns.extend(NdtMethod::ALL.map(Self::Result));
        columns
    }
}

/// Reduce a header cell to its comparable form.
#[must_use]
pub fn normalize_header(raw: &str) -> String {
    raw.lines()
        .next()
        .unwrap_or_default()
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Column positions found in a header row.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    positions: HashMap<Column, usize>,
}

impl HeaderMap {
    /// Map each recognized header cell to its column. The first occurrence of a
    /// column wins.
    pub fn from_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut lookup = HashMap::new();
        for column in Column::all() {
            for alias in column.aliases() {
                lookup.insert(normalize_header(&alias), column);
            }
        }

        let mut positions = HashMap::new();
        for (idx, header) in headers.into_iter().enumerate() {
            if let Some(column) = lookup.get(&normalize_header(header)) {
                positions.entry(*column).or_insert(idx);
            }
        }
        Self { positions }
    }

    #[must_use]
    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions.get(&column).copied()
    }

    /// Both natural-key columns are present.
    #[must_use]
    pub fn has_key_columns(&self) -> bool {
        self.position(Column::DrawingNumber).is_some() && self.position(Column::WeldJoint).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("图纸号", Column::DrawingNumber)]
    #[case("Drawing Number\n(see title block)", Column::DrawingNumber)]
    #[case("  weld_joint ", Column::WeldJoint)]
    #[case("介质", Column::SystemCode)]
    #[case("SubSystemCode", Column::SubsystemCode)]
    #[case("RT检测结果", Column::Result(NdtMethod::Rt))]
    #[case("PWHT Result", Column::Result(NdtMethod::Pwht))]
    #[case("pt", Column::Result(NdtMethod::Pt))]
    fn recognizes_aliases(#[case] header: &str, #[case] expected: Column) {
        let map = HeaderMap::from_headers([header]);
        assert_eq!(map.position(expected), Some(0));
    }

    #[test]
    fn unknown_headers_are_ignored() {
        let map = HeaderMap::from_headers(["备注", "Remarks", ""]);
        assert!(!map.has_key_columns());
        assert_eq!(map.position(Column::Size), None);
    }

    #[test]
    fn first_occurrence_wins() {
        let map = HeaderMap::from_headers(["图纸号", "焊缝编号", "DrawingNumber"]);
        assert_eq!(map.position(Column::DrawingNumber), Some(0));
        assert!(map.has_key_columns());
    }
}
