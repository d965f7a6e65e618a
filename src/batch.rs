//! Batched fan-out conversion on top of a pool.

use std::sync::Arc;

use tracing::debug;

use crate::config::{BatchOptions, PoolOptions};
use crate::core::{PoolError, QueueFullPolicy, TaskPool};
use crate::registry;

/// Stops the pool when the fan-out scope exits, normally or otherwise.
struct StopOnExit<'a>(&'a dyn TaskPool);

impl Drop for StopOnExit<'_> {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Multi-threaded conversion of a value collection in fixed-size batches.
///
/// Implementors supply [`convert_batch`](Self::convert_batch) and
/// [`options`](Self::options); the provided methods slice the input, obtain
/// the configured pool from the registry, and fan the batches out in
/// parallel. Converted values are the implementor's to deliver (for example
/// by appending to a shared collection); the fan-out itself returns
/// nothing.
///
/// A failing batch is contained and logged by the executing pool and does
/// not abort the remaining batches.
pub trait BatchConverter: Send + Sync + 'static {
    /// Element type being converted.
    type Value: Send + 'static;

    /// Sizing and pool selection for the fan-out.
    fn options(&self) -> &BatchOptions;

    /// Convert one batch. Runs on a pool worker, or on the calling thread
    /// when the configured pool size is zero.
    fn convert_batch(&self, batch: Vec<Self::Value>);

    /// Convert the whole collection, blocking until every batch is done.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidOptions`] for a zero batch size.
    fn convert(self: &Arc<Self>, values: Vec<Self::Value>) -> Result<(), PoolError>
    where
        Self: Sized,
    {
        self.convert_range(values, 0, None)
    }

    /// Convert the half-open range `[start_index, end_index)` of the
    /// collection; `None` means "to the end".
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidOptions`] for a zero batch size.
    fn convert_range(
        self: &Arc<Self>,
        values: Vec<Self::Value>,
        start_index: usize,
        end_index: Option<usize>,
    ) -> Result<(), PoolError>
    where
        Self: Sized,
    {
        if values.is_empty() {
            return Ok(());
        }
        let options = self.options();
        // Pool size zero yields a no-worker pool: every batch converts on
        // the calling thread.
        let pool = registry::factory_with(PoolOptions::new(
            &options.pool_prefix,
            options.pool_size,
        ))?;
        self.convert_with_pool(pool.as_ref(), values, start_index, end_index)
    }

    /// As [`convert_range`](Self::convert_range), but over an explicit
    /// submission interface such as a
    /// [`SerialPool`](crate::core::SerialPool). The pool is started before
    /// dispatch and stopped when the fan-out scope exits.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidOptions`] for a zero batch size; any error the
    /// pool reports on start or admission.
    fn convert_with_pool(
        self: &Arc<Self>,
        pool: &dyn TaskPool,
        values: Vec<Self::Value>,
        start_index: usize,
        end_index: Option<usize>,
    ) -> Result<(), PoolError>
    where
        Self: Sized,
    {
        if values.is_empty() {
            return Ok(());
        }
        let options = self.options();
        options.validate()?;
        let batch_size = options.batch_size;
        let total_batches = values.len() / batch_size;

        let end = end_index.unwrap_or(values.len()).min(values.len());
        let start = start_index.min(end);

        pool.start()?;
        let _stop = StopOnExit(pool);

        let mut batch = Vec::with_capacity(batch_size.min(end - start));
        let mut batch_index = 0_usize;
        for value in values.into_iter().skip(start).take(end - start) {
            batch.push(value);
            if batch.len() == batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                dispatch(self, pool, batch_index, total_batches, full)?;
                batch_index += 1;
            }
        }
        if !batch.is_empty() {
            dispatch(self, pool, batch_index, total_batches, batch)?;
        }
        Ok(())
    }
}

fn dispatch<C: BatchConverter>(
    converter: &Arc<C>,
    pool: &dyn TaskPool,
    batch_index: usize,
    total_batches: usize,
    batch: Vec<C::Value>,
) -> Result<(), PoolError> {
    debug!(
        batch = batch_index,
        total = total_batches,
        size = batch.len(),
        "dispatching batch"
    );
    let converter = Arc::clone(converter);
    pool.add_task(
        Box::new(move || {
            converter.convert_batch(batch);
            Ok(())
        }),
        &format!("batch_{batch_index}"),
        QueueFullPolicy::Block,
    )
}
