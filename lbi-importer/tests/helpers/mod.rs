//! Shared test helpers: export fixtures and a scripted submission client

#![allow(dead_code)]

pub mod fake_brainz;

use async_trait::async_trait;
use chrono::Utc;
use lbi_importer::{CsvListenSource, Listen, SubmissionClient, SubmitError};
use std::sync::Mutex;

pub const HEADER: &str =
    "SongTitle,Artist,ISRC,AlbumTitle,IP Address,Listening Time,Platform Name,Platform Model,Date";

/// Export text with `rows` well-formed listens, one minute apart
pub fn export_with_rows(rows: usize) -> String {
    let mut text = String::from(HEADER);
    text.push('\n');
    for i in 1..=rows {
        text.push_str(&format!(
            "Track {i},Artist {i},ISRC{i:04},Album {i},10.0.0.1,180,web,Firefox,2024-01-01 10:{:02}:00\n",
            i % 60
        ));
    }
    text
}

/// Listen source over in-memory export text, dates read as UTC
pub fn source(text: &str) -> CsvListenSource<&[u8], Utc> {
    CsvListenSource::with_time_zone(text.as_bytes(), Utc)
}

/// How a scripted call should fail
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Transient,
    InvalidToken,
    Rejected,
    NotOk,
}

impl Failure {
    fn to_error(self) -> SubmitError {
        match self {
            Failure::Transient => SubmitError::Transient("connection reset by peer".to_string()),
            Failure::InvalidToken => SubmitError::InvalidToken,
            Failure::Rejected => SubmitError::Rejected {
                status: 400,
                message: "invalid listen".to_string(),
            },
            Failure::NotOk => SubmitError::Unexpected("status 'error'".to_string()),
        }
    }
}

/// Submission client that records accepted batches and fails on chosen calls
#[derive(Default)]
pub struct ScriptedClient {
    accepted: Mutex<Vec<Vec<Listen>>>,
    calls: Mutex<usize>,
    /// (1-based call number, failure); `None` call number fails every call
    failure: Option<(Option<usize>, Failure)>,
}

impl ScriptedClient {
    pub fn accepting() -> Self {
        Self::default()
    }

    /// Fail the `call`-th submission (1-based)
    pub fn failing_on(call: usize, failure: Failure) -> Self {
        Self {
            failure: Some((Some(call), failure)),
            ..Self::default()
        }
    }

    pub fn failing_always(failure: Failure) -> Self {
        Self {
            failure: Some((None, failure)),
            ..Self::default()
        }
    }

    pub fn accepted_batches(&self) -> Vec<Vec<Listen>> {
        self.accepted.lock().unwrap().clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.accepted.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl SubmissionClient for ScriptedClient {
    async fn submit_many(&self, listens: &[Listen]) -> Result<(), SubmitError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };

        if let Some((on_call, failure)) = self.failure {
            if on_call.map_or(true, |n| n == call) {
                return Err(failure.to_error());
            }
        }

        self.accepted.lock().unwrap().push(listens.to_vec());
        Ok(())
    }
}
