use polars::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::domain::RosterError;
use crate::model::Student;

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_type: FileType,
}

const REQUIRED_COLUMNS: [&str; 7] = [
    "id",
    "name",
    "class_name",
    "grade",
    "student_id",
    "email",
    "last_login",
];

// The reference roster the view is seeded with when no file is given.
pub fn fixture_roster() -> Vec<Student> {
    let rows = [
        ("001", "Alice Johnson", "US History", "A", "ST12345", "alice@example.com", "2024-08-01"),
        ("002", "Bob Smith", "Civics", "B", "ST12346", "bob@example.com", "2024-08-02"),
        ("003", "Charlie Brown", "English Language", "A-", "ST12347", "charlie@example.com", "2024-08-03"),
        ("004", "Diana Ross", "US Government", "B+", "ST12348", "diana@example.com", "2024-08-04"),
        ("005", "Ethan Hunt", "US History", "C", "ST12349", "ethan@example.com", "2024-08-05"),
        ("006", "Fiona Gallagher", "Civics", "A", "ST12350", "fiona@example.com", "2024-08-06"),
        ("007", "George Michael", "English Language", "B-", "ST12351", "george@example.com", "2024-08-07"),
        ("008", "Hannah Montana", "US Government", "A+", "ST12352", "hannah@example.com", "2024-08-08"),
    ];
    rows.into_iter()
        .map(
            |(id, name, class_name, grade, student_id, email, last_login)| Student {
                id: id.to_string(),
                name: name.to_string(),
                class_name: class_name.to_string(),
                grade: grade.to_string(),
                student_id: student_id.to_string(),
                email: email.to_string(),
                last_login: last_login.to_string(),
            },
        )
        .collect()
}

/// Loads a roster file and returns the records in file order.
pub fn load_roster(path: PathBuf) -> Result<Vec<Student>, RosterError> {
    let file_info = get_file_info(path)?;
    let frame = match file_info.file_type {
        FileType::CSV => load_csv(&file_info.path)?,
        FileType::PARQUET => load_parquet(&file_info.path)?,
        FileType::ARROW => load_arrow(&file_info.path)?,
    };

    let start_time = Instant::now();
    let df = frame.collect()?;
    let students = students_from_frame(&df)?;
    info!(
        "Loaded {} records from {:?} in {}ms",
        students.len(),
        file_info.path,
        start_time.elapsed().as_millis()
    );
    Ok(students)
}

fn students_from_frame(df: &DataFrame) -> Result<Vec<Student>, RosterError> {
    let mut columns = Vec::with_capacity(REQUIRED_COLUMNS.len());
    for name in REQUIRED_COLUMNS {
        columns.push(load_column(df, name)?);
    }
    debug!("Roster columns: {:?}", df.get_column_names());

    let nrows = df.height();
    let mut students = Vec::with_capacity(nrows);
    let mut seen_ids = HashSet::new();
    for row in 0..nrows {
        let student = Student {
            id: columns[0][row].clone(),
            name: columns[1][row].clone(),
            class_name: columns[2][row].clone(),
            grade: columns[3][row].clone(),
            student_id: columns[4][row].clone(),
            email: columns[5][row].clone(),
            last_login: columns[6][row].clone(),
        };
        if !seen_ids.insert(student.id.clone()) {
            return Err(RosterError::LoadingFailed(format!(
                "duplicate record id \"{}\"",
                student.id
            )));
        }
        students.push(student);
    }
    Ok(students)
}

fn load_column(df: &DataFrame, name: &str) -> Result<Vec<String>, RosterError> {
    let column = df
        .column(name)
        .map_err(|_| RosterError::LoadingFailed(format!("missing column \"{name}\"")))?;
    let col = column.cast(&DataType::String)?;
    let series = col.str()?;
    Ok(series
        .into_iter()
        .map(|value| value.unwrap_or("").to_string())
        .collect())
}

fn detect_file_type(path: &Path) -> Result<FileType, RosterError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(RosterError::UnknownFileType),
    }
}

fn get_file_info(path: PathBuf) -> Result<FileInfo, RosterError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RosterError::FileNotFound,
        ErrorKind::PermissionDenied => RosterError::PermissionDenied,
        _ => RosterError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(RosterError::LoadingFailed("Not a file!".into()));
    }

    let file_type = detect_file_type(&path)?;

    Ok(FileInfo { path, file_type })
}

fn load_csv(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.as_path().into()))
        .with_has_header(true)
        .finish()
}

fn load_parquet(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(
        PlPath::Local(path.as_path().into()),
        ScanArgsParquet::default(),
    )
}

fn load_arrow(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.as_path().into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}
