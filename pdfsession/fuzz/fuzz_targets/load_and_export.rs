#![no_main]

use libfuzzer_sys::fuzz_target;
use pdfsession::{Session, SessionConfig, SourceFile};
use std::sync::OnceLock;
use tokio::runtime::{Builder, Runtime};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| Builder::new_current_thread().enable_all().build().unwrap())
}

// Arbitrary bytes must either be rejected at load time or export cleanly.
fuzz_target!(|data: &[u8]| {
    runtime().block_on(async {
        let mut session = Session::new(SessionConfig::default());
        let results = session
            .add_files(vec![SourceFile::new("fuzz.pdf", data.to_vec())])
            .await;

        if results.iter().all(|result| result.is_err()) {
            assert!(session.groups().is_empty());
            return;
        }

        let _ = session.export().await;
    });
});
