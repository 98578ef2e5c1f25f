use tracing::info;

use crate::analysis::{self, Rendered};
use crate::api::error::ServiceError;
use crate::db::Stores;

pub const DEFAULT_WEIGHT_MPG_YEAR: &str = "2021";

/// Ad hoc plots, rendered synchronously on request and kept by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plot {
    /// Fleet-wide CO2 for every model year
    Co2Overview,
    /// Weight vs. MPG within one model year
    WeightMpg { year: String },
}

impl Plot {
    /// Name the image is stored under
    pub fn image_name(&self) -> String {
        match self {
            Plot::Co2Overview => "image".to_string(),
            Plot::WeightMpg { year } => format!("weight_mpg.{}", year),
        }
    }
}

pub struct PlotService {
    stores: Stores,
}

impl PlotService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Render `plot` from the loaded records and store the image
    pub async fn generate(&self, plot: &Plot) -> Result<u64, ServiceError> {
        if self.stores.records.is_empty().await? {
            return Err(ServiceError::Conflict(
                "Auto Trends data not loaded yet, cannot generate plot".to_string(),
            ));
        }

        let records = self.stores.records.all().await?;
        let Rendered { image, skipped } = match plot {
            Plot::Co2Overview => analysis::co2_overview_chart(&records)?,
            Plot::WeightMpg { year } => analysis::weight_mpg_chart(&records, year)?,
        };

        self.stores.images.put(&plot.image_name(), image).await?;
        info!("Service: Stored plot {}", plot.image_name());
        Ok(skipped)
    }

    pub async fn get(&self, plot: &Plot) -> Result<Vec<u8>, ServiceError> {
        self.stores
            .images
            .get(&plot.image_name())
            .await?
            .ok_or_else(|| not_loaded(plot))
    }

    pub async fn delete(&self, plot: &Plot) -> Result<(), ServiceError> {
        if self.stores.images.delete(&plot.image_name()).await? {
            info!("Service: Deleted plot {}", plot.image_name());
            Ok(())
        } else {
            Err(not_loaded(plot))
        }
    }
}

fn not_loaded(plot: &Plot) -> ServiceError {
    ServiceError::NotFound(format!(
        "Image {} not found or has not been generated yet",
        plot.image_name()
    ))
}
