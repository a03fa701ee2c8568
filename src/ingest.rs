//! # Ingestion
//!
//! Unpacks an archive of workbooks and writes the first worksheet of each one
//! as a table of the store, replacing any table of the same name.
use crate::database::column::Column;
use crate::database::column::ColumnType;
use crate::database::store::Store;
use crate::database::table::unique_names;
use crate::error::ResultMessage;
use crate::error::SheetflowError;
use crate::helpers::zip::ZipHelper;
use crate::spreadsheet::is_spreadsheet_name;
use crate::spreadsheet::read_first_sheet;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::SPREADSHEET_EXTENSIONS;
use duckdb::types::Value;
use regex::Regex;
use serde::Serialize;
use std::io::Cursor;
use std::sync::LazyLock;
use thiserror::Error;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use zip::ZipArchive;

/// Column names that are renamed to the canonical identity column.
const IDENTITY_ALIASES: [&str; 1] = ["CADASTRO"];
const IDENTITY_COLUMN: &str = "MATRICULA";

static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s./\\-]+").expect("Hardcode regex pattern"));

/// Failures that leave the pipeline without tables to operate on.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Archive is unreadable: {0}")]
    UnreadableArchive(SheetflowError),

    #[error("Store is unavailable: {0}")]
    StoreUnavailable(SheetflowError),
}

/// A workbook member written as a table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IngestedTable {
    pub member: String,
    pub table: String,
    pub columns: Vec<String>,
    pub rows: usize,
}

/// A workbook member that could not be turned into a table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkippedMember {
    pub member: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub tables: Vec<IngestedTable>,
    pub skipped: Vec<SkippedMember>,
}

/// A worksheet converted to typed columns and rows, ready for the store.
struct LoadedSheet {
    table: String,
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

/// Ingests every recognized workbook of `archive` into `store`.
///
/// Members that are not workbooks are ignored. Workbooks that cannot be read are
/// reported as skipped with a warning. An archive without any usable workbook
/// yields an empty report.
pub fn ingest_archive(store: &Store, archive: &[u8]) -> Result<IngestReport, IngestError> {
    let mut zip = ZipArchive::new(Cursor::new(archive))
        .map_err(|error| IngestError::UnreadableArchive(error.into()))?;

    let mut report = IngestReport::default();
    for (index, member) in zip.member_names() {
        if is_ignored_member(&member) {
            log::debug!("Ignore archive member '{member}'");
            continue;
        }
        let sheet = match zip.read_member(index).and_then(|bytes| load_sheet(&member, bytes)) {
            Ok(sheet) => sheet,
            Err(error) => {
                log::warn!("Skip '{member}': {error}");
                report.skipped.push(SkippedMember { member, reason: error.to_string() });
                continue;
            }
        };

        let rows = store
            .replace_table(&sheet.table, &sheet.columns, sheet.rows)
            .with_prefix(&format!("Write table '{}'", sheet.table))
            .map_err(IngestError::StoreUnavailable)?;
        if let Some(position) = report.tables.iter().position(|table| table.table == sheet.table) {
            let replaced = report.tables.remove(position);
            log::warn!("Table '{}' from '{}' replaced by '{member}'", replaced.table, replaced.member);
            report.skipped.push(SkippedMember {
                reason: format!("table '{}' replaced by '{member}'", replaced.table),
                member: replaced.member,
            });
        }
        log::info!("Imported '{member}' as table '{}' ({rows} rows)", sheet.table);
        report.tables.push(IngestedTable {
            member,
            table: sheet.table,
            columns: sheet.columns.into_iter().map(|column| column.name).collect(),
            rows,
        });
    }

    if report.tables.is_empty() {
        log::warn!("Archive holds no readable spreadsheet; the store is left unchanged");
    }
    Ok(report)
}

/// Directories, resource forks, lock files and non-workbook members are not ingested.
fn is_ignored_member(member: &str) -> bool {
    let base_name = member.rsplit('/').next().unwrap_or(member);
    member.starts_with("__MACOSX/")
        || member.contains("/__MACOSX/")
        || base_name.starts_with("~$")
        || base_name.starts_with("._")
        || !is_spreadsheet_name(member)
}

fn load_sheet(member: &str, bytes: Vec<u8>) -> Result<LoadedSheet, SheetflowError> {
    let table = table_name(member);
    if table.is_empty() {
        Err(SheetflowError::WithContextError(format!("'{member}' does not yield a table name")))?
    }

    let sheet = read_first_sheet(member, bytes)?;
    let records = sheet.records();
    let (header, body) = records
        .split_first()
        .ok_or_else(|| SpreadsheetError::SheetEmptyError(member.to_owned(), sheet.name.to_owned()))?;

    let names = header
        .iter()
        .enumerate()
        .map(|(index, cell)| {
            let name = match cell {
                Some(cell) => normalize_column(&cell.to_text().map_err(|message| {
                    SpreadsheetError::CellValueError(member.to_owned(), sheet.name.to_owned(), cell.reference(), message)
                })?),
                None => String::new(),
            };
            Ok(if name.is_empty() { format!("UNNAMED_{index}") } else { name })
        })
        .collect::<Result<Vec<String>, SheetflowError>>()?;

    let columns: Vec<Column> = unique_names(names)
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            let kinds = body
                .iter()
                .map(|record| record[index].and_then(|cell| ColumnType::from(&cell.kind, &cell.value)))
                .collect();
            Column { name, kind: ColumnType::detect(kinds) }
        })
        .collect();

    let rows = body
        .iter()
        .map(|record| {
            columns
                .iter()
                .zip(record)
                .map(|(column, cell)| column.to_value(&sheet.name, member, *cell))
                .collect::<Result<Vec<Value>, SheetflowError>>()
        })
        .collect::<Result<Vec<_>, SheetflowError>>()?;

    Ok(LoadedSheet { table, columns, rows })
}

/// Normalizes a header or file stem into an identifier:
/// trims, removes `:` and non-breaking spaces, collapses runs of space, `.`, `/`, `\` and `-`
/// into one underscore, trims underscores, uppercases and strips accents.
pub fn normalize_name(text: &str) -> String {
    let text = text.replace([':', '\u{a0}'], "");
    let text = SEPARATORS.replace_all(text.trim(), "_");
    text.trim_matches('_')
        .to_uppercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Normalizes a column name, mapping identity aliases onto the canonical column.
pub fn normalize_column(text: &str) -> String {
    let name = normalize_name(text);
    if IDENTITY_ALIASES.contains(&name.as_str()) {
        IDENTITY_COLUMN.to_owned()
    } else {
        name
    }
}

/// Table name of an archive member: the normalized base name without its workbook extension.
pub fn table_name(member: &str) -> String {
    let base_name = member.rsplit(['/', '\\']).next().unwrap_or(member);
    let stem = match base_name.rsplit_once('.') {
        Some((stem, extension)) if SPREADSHEET_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(extension)) => stem,
        _ => base_name,
    };
    normalize_name(stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::table::Datum;
    use crate::database::table::TabularResult;
    use crate::spreadsheet::writer::write_workbook;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn archive(members: Vec<(&str, Vec<u8>)>) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in members {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(&bytes).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn workbook(columns: &[&str], rows: Vec<Vec<Datum>>) -> Vec<u8> {
        let result = TabularResult::new(columns.iter().map(|name| name.to_string()).collect(), rows);
        write_workbook("Sheet1", &result).unwrap()
    }

    #[test]
    fn normalizes_names() {
        assert_eq!(normalize_name(" Valor  Diário VR "), "VALOR_DIARIO_VR");
        assert_eq!(normalize_name("Admissão:"), "ADMISSAO");
        assert_eq!(normalize_name("dt.-/\\ref\u{a0}"), "DT_REF");
        assert_eq!(normalize_name("__COMPETÊNCIA__"), "COMPETENCIA");
        assert_eq!(normalize_column("Cadastro"), "MATRICULA");
        assert_eq!(normalize_column("CADASTRO_2"), "CADASTRO_2");
        assert_eq!(table_name("dados/Férias 2025.xlsx"), "FERIAS_2025");
        assert_eq!(table_name("T.XLSM"), "T");
    }

    #[test]
    fn ignores_non_workbook_members() {
        assert!(is_ignored_member("__MACOSX/._T.xlsx"));
        assert!(is_ignored_member("dir/~$T.xlsx"));
        assert!(is_ignored_member("readme.txt"));
        assert!(!is_ignored_member("dir/T.xlsx"));
    }

    #[test]
    fn ingests_workbooks_and_reports_skips() {
        let store = Store::open_in_memory().unwrap();
        let bytes = archive(vec![
            ("T.xlsx", workbook(&["CADASTRO", "Name", "", "Name"], vec![
                vec![Datum::Int(10), Datum::Text("Ana".into()), Datum::Float(1.5), Datum::Text("A".into())],
                vec![Datum::Int(11), Datum::Null, Datum::Int(2), Datum::Null],
            ])),
            ("broken.xlsx", b"not a workbook".to_vec()),
            ("notes.txt", b"hello".to_vec()),
        ]);

        let report = ingest_archive(&store, &bytes).unwrap();
        assert_eq!(report.tables.len(), 1);
        assert_eq!(report.tables[0].table, "T");
        assert_eq!(report.tables[0].columns, vec!["MATRICULA", "NAME", "UNNAMED_2", "NAME_1"]);
        assert_eq!(report.tables[0].rows, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].member, "broken.xlsx");

        let result = store.query("SELECT MATRICULA, UNNAMED_2 FROM T ORDER BY MATRICULA").unwrap();
        assert_eq!(
            result.rows(),
            [vec![Datum::Int(10), Datum::Float(1.5)], vec![Datum::Int(11), Datum::Float(2.0)]]
        );
    }

    fn dated_workbook(serial: &str) -> Vec<u8> {
        let sheet = format!(
            r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Admissão</t></is></c></row><row r="2"><c r="A2" s="1"><v>{serial}</v></c></row></sheetData></worksheet>"#
        );
        archive(vec![
            (
                "xl/workbook.xml",
                br#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Plan1" sheetId="1" r:id="rId1"/></sheets></workbook>"#.to_vec(),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                br#"<Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_vec(),
            ),
            ("xl/styles.xml", br#"<styleSheet><cellXfs><xf numFmtId="0"/><xf numFmtId="14"/></cellXfs></styleSheet>"#.to_vec()),
            ("xl/worksheets/sheet1.xml", sheet.into_bytes()),
        ])
    }

    #[test]
    fn out_of_range_date_skips_only_its_workbook() {
        let store = Store::open_in_memory().unwrap();
        let bytes = archive(vec![
            ("Admissoes.xlsx", dated_workbook("45658")),
            ("Overflow.xlsx", dated_workbook("1000000000")),
        ]);

        let report = ingest_archive(&store, &bytes).unwrap();
        assert_eq!(report.tables.len(), 1);
        assert_eq!(report.tables[0].table, "ADMISSOES");
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].member, "Overflow.xlsx");
        assert!(report.skipped[0].reason.contains("out of range"));

        let result = store.query("SELECT CAST(ADMISSAO AS VARCHAR) AS D FROM ADMISSOES").unwrap();
        assert_eq!(result.rows(), [vec![Datum::Text("2025-01-01".into())]]);
    }

    #[test]
    fn corrupt_member_is_skipped() {
        let store = Store::open_in_memory().unwrap();
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("notes.txt", stored).unwrap();
        zip.write_all(b"notes payload").unwrap();
        zip.start_file("bad.xlsx", stored).unwrap();
        zip.write_all(b"workbook payload").unwrap();
        zip.start_file("T.xlsx", SimpleFileOptions::default()).unwrap();
        zip.write_all(&workbook(&["A"], vec![vec![Datum::Int(1)]])).unwrap();
        let mut bytes = zip.finish().unwrap().into_inner();

        for payload in [&b"notes payload"[..], &b"workbook payload"[..]] {
            let position = bytes.windows(payload.len()).position(|window| window == payload).unwrap();
            bytes[position] ^= 0xff;
        }

        let report = ingest_archive(&store, &bytes).unwrap();
        assert_eq!(report.tables.len(), 1);
        assert_eq!(report.tables[0].table, "T");
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].member, "bad.xlsx");
    }

    #[test]
    fn later_member_wins_a_table_name() {
        let store = Store::open_in_memory().unwrap();
        let bytes = archive(vec![
            ("T.xlsx", workbook(&["A"], vec![vec![Datum::Int(1)]])),
            ("dir/t.XLSX", workbook(&["A"], vec![vec![Datum::Int(2)]])),
        ]);

        let report = ingest_archive(&store, &bytes).unwrap();
        assert_eq!(report.tables.len(), 1);
        assert_eq!(report.tables[0].member, "dir/t.XLSX");
        assert_eq!(
            report.skipped,
            vec![SkippedMember { member: "T.xlsx".into(), reason: "table 'T' replaced by 'dir/t.XLSX'".into() }]
        );
        assert_eq!(store.query("SELECT A FROM T").unwrap().rows(), [vec![Datum::Int(2)]]);
    }

    #[test]
    fn password_protected_workbook_is_skipped() {
        let store = Store::open_in_memory().unwrap();
        let mut locked = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
        locked.extend_from_slice(&[0u8; 64]);
        let bytes = archive(vec![
            ("locked.xlsx", locked),
            ("T.xlsx", workbook(&["A"], vec![vec![Datum::Int(1)]])),
        ]);

        let report = ingest_archive(&store, &bytes).unwrap();
        assert_eq!(report.tables[0].table, "T");
        assert_eq!(report.skipped[0].member, "locked.xlsx");
        assert!(report.skipped[0].reason.contains("password protected"));
    }

    #[test]
    fn unreadable_archive_is_fatal() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(
            ingest_archive(&store, b"plain text"),
            Err(IngestError::UnreadableArchive(_))
        ));
    }

    #[test]
    fn empty_archive_yields_no_tables() {
        let store = Store::open_in_memory().unwrap();
        let report = ingest_archive(&store, &archive(vec![("notes.txt", b"x".to_vec())])).unwrap();
        assert!(report.tables.is_empty());
        assert!(report.skipped.is_empty());
        assert!(store.table_names().unwrap().is_empty());
    }
}
