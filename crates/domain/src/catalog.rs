//! Catalog records with denormalized counters.
//!
//! The counters are derived state. The checkout and cancellation pipelines
//! keep `orders_count` in step transactionally; `products_count` is
//! recomputable from the products collection by the counter synchronizer.

use common::{CategoryId, CompanyId, DosageFormId, ProductId, VariantId};
use doc_store::{Collection, DocumentId, Record};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub company: CompanyId,
    pub categories: Vec<CategoryId>,
    pub dosage_form: Option<DosageFormId>,
    pub variants: Vec<VariantId>,
}

impl Record for Product {
    const COLLECTION: Collection = Collection::Products;

    fn document_id(&self) -> DocumentId {
        self.id.as_uuid().into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub products_count: i64,
    pub orders_count: i64,
}

impl Record for Company {
    const COLLECTION: Collection = Collection::Companies;

    fn document_id(&self) -> DocumentId {
        self.id.as_uuid().into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub products_count: i64,
}

impl Record for Category {
    const COLLECTION: Collection = Collection::Categories;

    fn document_id(&self) -> DocumentId {
        self.id.as_uuid().into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DosageForm {
    pub id: DosageFormId,
    pub name: String,
    pub products_count: i64,
}

impl Record for DosageForm {
    const COLLECTION: Collection = Collection::DosageForms;

    fn document_id(&self) -> DocumentId {
        self.id.as_uuid().into()
    }
}
