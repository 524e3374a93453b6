use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("clock regression on stream {gindex}: {clock} < last emitted clock {last_clock}")]
    ClockRegression {
        gindex: usize,
        clock: i64,
        last_clock: i64,
    },

    #[error(transparent)]
    Stream(#[from] ovni_stream::Error),
}
