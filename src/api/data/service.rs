use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::info;

use crate::api::error::ServiceError;
use crate::dataset;
use crate::db::models::VehicleRecord;
use crate::db::Stores;

/// Dataset loading and the read-only listings over it.
///
/// Every listing is a full scan with an equality predicate; no match is an
/// empty list, never an error.
pub struct DataService {
    stores: Stores,
    data_path: PathBuf,
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl DataService {
    pub fn new(stores: Stores, data_path: PathBuf) -> Self {
        Self { stores, data_path }
    }

    /// Replace the record namespace with a dataset
    ///
    /// `csv` is an uploaded CSV body; without one the configured file is read.
    pub async fn load(&self, csv: Option<&[u8]>) -> Result<usize, ServiceError> {
        let records = match csv {
            Some(body) => dataset::parse_csv(body)?,
            None => dataset::load_file(&self.data_path)?,
        };
        let loaded = self.stores.records.replace_all(records).await?;
        info!("Service: Loaded {} records", loaded);
        Ok(loaded)
    }

    pub async fn list(&self) -> Result<Vec<VehicleRecord>, ServiceError> {
        Ok(self.stores.records.all().await?)
    }

    pub async fn clear(&self) -> Result<(), ServiceError> {
        self.stores.records.clear().await?;
        info!("Service: Record namespace cleared");
        Ok(())
    }

    async fn filtered(
        &self,
        predicate: impl Fn(&VehicleRecord) -> bool,
    ) -> Result<Vec<VehicleRecord>, ServiceError> {
        let mut records = self.list().await?;
        records.retain(|r| predicate(r));
        Ok(records)
    }

    pub async fn years(&self) -> Result<Vec<String>, ServiceError> {
        let records = self.list().await?;
        Ok(distinct(records.iter().map(VehicleRecord::model_year)))
    }

    pub async fn records_for_year(&self, year: &str) -> Result<Vec<VehicleRecord>, ServiceError> {
        self.filtered(|r| r.model_year() == year).await
    }

    pub async fn manufacturers(&self) -> Result<Vec<String>, ServiceError> {
        let records = self.list().await?;
        Ok(distinct(records.iter().map(VehicleRecord::manufacturer)))
    }

    pub async fn records_for_manufacturer(
        &self,
        manufacturer: &str,
    ) -> Result<Vec<VehicleRecord>, ServiceError> {
        self.filtered(|r| r.manufacturer() == manufacturer).await
    }

    pub async fn manufacturer_years(&self, manufacturer: &str) -> Result<Vec<String>, ServiceError> {
        let records = self.records_for_manufacturer(manufacturer).await?;
        Ok(distinct(records.iter().map(VehicleRecord::model_year)))
    }

    pub async fn records_for_manufacturer_year(
        &self,
        manufacturer: &str,
        year: &str,
    ) -> Result<Vec<VehicleRecord>, ServiceError> {
        self.filtered(|r| r.manufacturer() == manufacturer && r.model_year() == year)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "Manufacturer,Model Year,Vehicle Type,Real-World CO2 (g/mi)\n\
                       Ford,2020,Car,350\n\
                       Ford,2021,Truck,420\n\
                       Kia,2020,Car,300\n\
                       All,2020,All,340\n";

    async fn loaded() -> DataService {
        let service = DataService::new(Stores::in_memory(), PathBuf::from("unused.csv"));
        service.load(Some(CSV.as_bytes())).await.unwrap();
        service
    }

    #[tokio::test]
    async fn test_distinct_listings_are_sorted() {
        let service = loaded().await;
        assert_eq!(service.years().await.unwrap(), vec!["2020", "2021"]);
        assert_eq!(service.manufacturers().await.unwrap(), vec!["All", "Ford", "Kia"]);
        assert_eq!(service.manufacturer_years("Ford").await.unwrap(), vec!["2020", "2021"]);
    }

    #[tokio::test]
    async fn test_filters() {
        let service = loaded().await;
        assert_eq!(service.records_for_year("2020").await.unwrap().len(), 3);
        assert_eq!(service.records_for_manufacturer("Ford").await.unwrap().len(), 2);

        let rows = service.records_for_manufacturer_year("Ford", "2021").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].vehicle_type(), "Truck");
    }

    #[tokio::test]
    async fn test_absent_values_give_empty_lists() {
        let service = loaded().await;
        assert!(service.records_for_manufacturer("Tesla").await.unwrap().is_empty());
        assert!(service.records_for_year("1900").await.unwrap().is_empty());
        assert!(service.manufacturer_years("Tesla").await.unwrap().is_empty());
        assert!(service
            .records_for_manufacturer_year("Kia", "2021")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_clear_then_listings_are_empty() {
        let service = loaded().await;
        service.clear().await.unwrap();
        assert!(service.list().await.unwrap().is_empty());
        assert!(service.years().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_reported() {
        let service = DataService::new(Stores::in_memory(), PathBuf::from("/no/such/file.csv"));
        assert!(matches!(
            service.load(None).await,
            Err(ServiceError::Dataset(_))
        ));
    }
}
