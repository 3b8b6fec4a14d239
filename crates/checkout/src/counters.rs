//! Reconciliation of denormalized product counters.

use std::collections::HashMap;

use common::{CategoryId, CompanyId, DosageFormId};
use doc_store::{DocumentStore, DocumentStoreExt, WriteBatch};
use domain::{Category, Company, DosageForm, Product};

use crate::MAX_WRITE_ATTEMPTS;
use crate::error::{CheckoutError, Result};

/// Recomputes `products_count` on companies, categories and dosage forms
/// from the products collection.
///
/// Idempotent, and safe to run after any catalog mutation. Writes are
/// guarded on the versions read, so a concurrent `orders_count` bump is
/// never clobbered; the whole job retries on conflict.
#[derive(Clone)]
pub struct CounterSynchronizer<S> {
    store: S,
}

impl<S: DocumentStore> CounterSynchronizer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn sync_product_counts(&self) -> Result<()> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            match self.try_sync().await {
                Ok(()) => return Ok(()),
                Err(CheckoutError::Store(e)) if e.is_conflict() => continue,
                Err(e) => return Err(e),
            }
        }
        Err(CheckoutError::TransactionAborted)
    }

    async fn try_sync(&self) -> Result<()> {
        let products = self.store.list_records::<Product>().await?;

        let mut by_company: HashMap<CompanyId, i64> = HashMap::new();
        let mut by_category: HashMap<CategoryId, i64> = HashMap::new();
        let mut by_dosage_form: HashMap<DosageFormId, i64> = HashMap::new();
        for product in &products {
            *by_company.entry(product.record.company).or_default() += 1;
            for category in &product.record.categories {
                *by_category.entry(*category).or_default() += 1;
            }
            if let Some(form) = product.record.dosage_form {
                *by_dosage_form.entry(form).or_default() += 1;
            }
        }

        let mut batch = WriteBatch::new();

        for mut company in self.store.list_records::<Company>().await? {
            let count = by_company.get(&company.record.id).copied().unwrap_or(0);
            if company.record.products_count != count {
                company.record.products_count = count;
                let guard = company.guard();
                batch.put(&company.record, guard)?;
            }
        }
        for mut category in self.store.list_records::<Category>().await? {
            let count = by_category.get(&category.record.id).copied().unwrap_or(0);
            if category.record.products_count != count {
                category.record.products_count = count;
                let guard = category.guard();
                batch.put(&category.record, guard)?;
            }
        }
        for mut form in self.store.list_records::<DosageForm>().await? {
            let count = by_dosage_form.get(&form.record.id).copied().unwrap_or(0);
            if form.record.products_count != count {
                form.record.products_count = count;
                let guard = form.guard();
                batch.put(&form.record, guard)?;
            }
        }

        // Everything already in step.
        if batch.is_empty() {
            return Ok(());
        }

        self.store.apply(batch).await?;
        Ok(())
    }
}
