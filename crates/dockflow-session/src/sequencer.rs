//! イメージごとの操作を厳密な順序で実行
//!
//! 全ステップが同じデーモン接続とレジストリログインを共有するため、
//! ステップ `i + 1` はステップ `i` の完了後に開始します。最初の失敗で
//! 停止し、以降のステップは実行しません。

use crate::error::{Result, TaskError};
use futures_util::future::BoxFuture;
use std::future::Future;

type StepFn<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, Result<T>> + Send + 'a>;

struct Step<'a, T> {
    label: String,
    run: StepFn<'a, T>,
}

/// 遅延実行する操作の順序付きリスト
pub struct Sequencer<'a, T> {
    steps: Vec<Step<'a, T>>,
}

impl<'a, T: Send + 'a> Default for Sequencer<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: Send + 'a> Sequencer<'a, T> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// ステップを追加。`label` は失敗時の表示に使う
    pub fn push<F, Fut>(&mut self, label: impl Into<String>, step: F)
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T>> + Send + 'a,
    {
        self.steps.push(Step {
            label: label.into(),
            run: Box::new(move || Box::pin(step())),
        });
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// 全ステップを順に実行して結果を集める
    ///
    /// 失敗時のエラーは完了したステップ数を持ち、ステップ自身のエラーを
    /// source として包む。
    pub async fn run(self) -> Result<Vec<T>> {
        let total = self.steps.len();
        let mut results = Vec::with_capacity(total);

        for (index, step) in self.steps.into_iter().enumerate() {
            tracing::debug!("Step {}/{}: {}", index + 1, total, step.label);
            match (step.run)().await {
                Ok(value) => results.push(value),
                Err(source) => {
                    tracing::debug!("Step {}/{} failed: {}", index + 1, total, step.label);
                    return Err(TaskError::Sequence {
                        completed: index,
                        total,
                        step: step.label,
                        source: Box::new(source),
                    });
                }
            }
        }

        Ok(results)
    }
}
