/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::io::{self, Write};

use chrono::Local;
use flume::{Receiver, Sender};
use slog::{Drain, KV, Key, Level, OwnedKVList, Record, Serializer};

const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub struct StdLogValue {
    level: Level,
    message: String,
    kv_pairs: Vec<(String, String)>,
    location: String,
}

impl StdLogValue {
    pub fn level(&self) -> Level {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kv_pairs(&self) -> &[(String, String)] {
        &self.kv_pairs
    }

    fn message_str(&self) -> &str {
        if self.message.is_empty() {
            "()"
        } else {
            &self.message
        }
    }

    fn write_plain<IO: Write>(&self, io: &mut IO) -> io::Result<()> {
        write!(io, "{}", Local::now().format(LOG_TIME_FORMAT))?;
        write!(io, " {}", self.level)?;
        for (k, v) in &self.kv_pairs {
            write!(io, " {k}: {v},")?;
        }
        write!(io, " {}", self.message_str())?;
        write!(io, " <{}>", self.location)?;
        writeln!(io)
    }
}

#[derive(Default)]
struct KvCollector {
    kv_pairs: Vec<(String, String)>,
}

impl Serializer for KvCollector {
    fn emit_arguments(&mut self, key: Key, val: &fmt::Arguments) -> slog::Result {
        self.kv_pairs.push((key.to_string(), val.to_string()));
        Ok(())
    }
}

/// Format records in the caller thread and hand them to the writer thread.
pub struct StdLogDrain {
    sender: Sender<StdLogValue>,
}

impl StdLogDrain {
    pub fn new(sender: Sender<StdLogValue>) -> Self {
        StdLogDrain { sender }
    }
}

impl Drain for StdLogDrain {
    type Ok = ();
    type Err = slog::Error;

    fn log(&self, record: &Record, logger_values: &OwnedKVList) -> Result<(), slog::Error> {
        let mut kv = KvCollector::default();
        logger_values.serialize(record, &mut kv)?;
        record.kv().serialize(record, &mut kv)?;

        let v = StdLogValue {
            level: record.level(),
            message: record.msg().to_string(),
            kv_pairs: kv.kv_pairs,
            location: format!("{}:{}", record.file(), record.line()),
        };
        // drop the record if the writer is lagging behind
        let _ = self.sender.try_send(v);
        Ok(())
    }
}

pub fn new_async_logger(thread_name: &str, channel_capacity: usize) -> StdLogDrain {
    let (sender, receiver) = flume::bounded::<StdLogValue>(channel_capacity);

    let _detached_thread = std::thread::Builder::new()
        .name(thread_name.to_string())
        .spawn(move || run_with_stderr(receiver));

    StdLogDrain::new(sender)
}

fn run_with_stderr(receiver: Receiver<StdLogValue>) {
    let mut io = io::stderr();
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    while let Ok(v) = receiver.recv() {
        buf.clear();
        let _ = v.write_plain(&mut buf);
        let _ = io.write_all(&buf);

        while let Ok(v) = receiver.try_recv() {
            buf.clear();
            let _ = v.write_plain(&mut buf);
            let _ = io.write_all(&buf);
        }

        let _ = io.flush();
    }
}
