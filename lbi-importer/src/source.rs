//! Listen sources
//!
//! A [`ListenSource`] is a lazy, single-pass, ordered stream of listens with the
//! header already consumed. Skipping advances over raw rows without building
//! [`Listen`] values, so rows from earlier runs are never date-parsed again.

use crate::error::ImportError;
use crate::models::Listen;
use chrono::{Local, TimeZone};
use csv::{ByteRecord, ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub trait ListenSource {
    /// Advance past up to `count` rows, returning how many were actually skipped
    ///
    /// Fewer than `count` means the stream is exhausted.
    fn skip_rows(&mut self, count: u64) -> Result<u64, ImportError>;

    /// Next listen, `None` at end of stream
    fn next_listen(&mut self) -> Option<Result<Listen, ImportError>>;
}

/// Listens read from a Deezer CSV export
pub struct CsvListenSource<R: Read, Tz: TimeZone = Local> {
    reader: csv::Reader<R>,
    record: StringRecord,
    raw: ByteRecord,
    tz: Tz,
}

impl CsvListenSource<File, Local> {
    /// Open an export file, reading dates in the machine's local time zone
    pub fn open(path: &Path) -> Result<Self, ImportError> {
        Ok(Self::from_reader(File::open(path).map_err(csv::Error::from)?))
    }
}

impl<R: Read> CsvListenSource<R, Local> {
    pub fn from_reader(reader: R) -> Self {
        Self::with_time_zone(reader, Local)
    }
}

impl<R: Read, Tz: TimeZone> CsvListenSource<R, Tz> {
    pub fn with_time_zone(reader: R, tz: Tz) -> Self {
        // flexible: short rows surface as MalformedRecord with a line number
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        Self {
            reader,
            record: StringRecord::new(),
            raw: ByteRecord::new(),
            tz,
        }
    }

    fn current_line(&self) -> u64 {
        self.record.position().map(|p| p.line()).unwrap_or(0)
    }
}

impl<R: Read, Tz: TimeZone> ListenSource for CsvListenSource<R, Tz> {
    fn skip_rows(&mut self, count: u64) -> Result<u64, ImportError> {
        let mut skipped = 0;
        while skipped < count {
            if !self.reader.read_byte_record(&mut self.raw)? {
                break;
            }
            skipped += 1;
        }
        Ok(skipped)
    }

    fn next_listen(&mut self) -> Option<Result<Listen, ImportError>> {
        match self.reader.read_record(&mut self.record) {
            Ok(true) => Some(Listen::from_record(&self.record, &self.tz).map_err(|source| {
                ImportError::MalformedRecord {
                    line: self.current_line(),
                    source,
                }
            })),
            Ok(false) => None,
            Err(e) => Some(Err(ImportError::Csv(e))),
        }
    }
}

/// Progress key for an input file: the base name of its resolved path
pub fn file_key_for(path: &Path) -> Option<String> {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListenParseError;
    use chrono::Utc;

    const EXPORT: &str = "\
SongTitle,Artist,ISRC,AlbumTitle,IP Address,Listening Time,Platform Name,Platform Model,Date
One,Artist A,ISRC0001,Album A,10.0.0.1,200,web,Firefox,2024-01-01 10:00:00
Two,Artist B,,Album B,10.0.0.1,180,web,Firefox,2024-01-01 10:04:00
\"Three, with comma\",Artist C,ISRC0003,Album C,10.0.0.1,240,android,Pixel,2024-01-01 10:08:00
";

    fn source(data: &'static str) -> CsvListenSource<&'static [u8], Utc> {
        CsvListenSource::with_time_zone(data.as_bytes(), Utc)
    }

    fn drain(src: &mut impl ListenSource) -> Vec<Listen> {
        let mut listens = Vec::new();
        while let Some(listen) = src.next_listen() {
            listens.push(listen.unwrap());
        }
        listens
    }

    #[test]
    fn test_header_is_not_a_listen() {
        let listens = drain(&mut source(EXPORT));
        assert_eq!(listens.len(), 3);
        assert_eq!(listens[0].track_name, "One");
        assert_eq!(listens[2].track_name, "Three, with comma");
        assert_eq!(listens[1].isrc, "");
    }

    #[test]
    fn test_skip_rows_is_exact() {
        let mut src = source(EXPORT);
        assert_eq!(src.skip_rows(2).unwrap(), 2);

        let listens = drain(&mut src);
        assert_eq!(listens.len(), 1);
        assert_eq!(listens[0].track_name, "Three, with comma");
    }

    #[test]
    fn test_skip_past_end_exhausts_stream() {
        let mut src = source(EXPORT);
        assert_eq!(src.skip_rows(10).unwrap(), 3);
        assert!(src.next_listen().is_none());
    }

    #[test]
    fn test_skipped_rows_are_not_parsed() {
        let data = "\
h1,h2,h3,h4,h5,h6,h7,h8,h9
bad,row
One,Artist A,,Album A,,,,,2024-01-01 10:00:00
";
        let mut src = source(data);
        assert_eq!(src.skip_rows(1).unwrap(), 1);
        assert_eq!(drain(&mut src).len(), 1);
    }

    #[test]
    fn test_malformed_row_reports_line() {
        let data = "\
h1,h2,h3,h4,h5,h6,h7,h8,h9
One,Artist A,,Album A,,,,,2024-01-01 10:00:00
Two,Artist B,,Album B,,,,,01/01/2024 10:00
";
        let mut src = source(data);
        assert!(src.next_listen().unwrap().is_ok());

        match src.next_listen() {
            Some(Err(ImportError::MalformedRecord { line, source })) => {
                assert_eq!(line, 3);
                assert!(matches!(source, ListenParseError::Timestamp { .. }));
            }
            other => panic!("expected malformed record, got {other:?}"),
        }
    }

    #[test]
    fn test_file_key_is_base_name() {
        let key = file_key_for(Path::new("/does/not/exist/deezer-listeningHistory.csv"));
        assert_eq!(key.as_deref(), Some("deezer-listeningHistory.csv"));
    }
}
