pub mod product_service;
pub mod variant_resolver;

pub use product_service::ProductService;
pub use variant_resolver::VariantResolver;
