use crate::error::{Result, ScrapeError};
use crate::models::{PropertyField, PropertyRecord, LATITUDE, LONGITUDE, URL};
use csv::Writer;

/// UTF-8 byte-order mark, so spreadsheet apps detect the encoding
pub const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Header row: the well-known labels, coordinates and url, then every other
/// key in the order it first appears across `records`
pub fn columns(records: &[PropertyRecord]) -> Vec<String> {
    let mut columns: Vec<String> = PropertyField::ALL
        .iter()
        .map(|f| f.label().to_string())
        .chain([LATITUDE, LONGITUDE, URL].iter().map(|c| c.to_string()))
        .collect();

    for record in records {
        for key in record.extra_keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.to_string());
            }
        }
    }

    columns
}

/// Serialize records as BOM-prefixed CSV with one row per record
pub fn to_csv(records: &[PropertyRecord]) -> Result<Vec<u8>> {
    let columns = columns(records);
    let mut writer = Writer::from_writer(BOM.to_vec());

    writer.write_record(&columns)?;
    for record in records {
        writer.write_record(
            columns
                .iter()
                .map(|c| record.column(c).unwrap_or_default()),
        )?;
    }

    writer
        .into_inner()
        .map_err(|e| ScrapeError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use csv::ReaderBuilder;
    use std::collections::{HashMap, HashSet};

    fn sample() -> Vec<PropertyRecord> {
        let mut first = PropertyRecord::new("https://batdongsan.com.vn/pr1");
        first.set("Diện tích", "80 m²");
        first.set("Mức giá", "5,2 tỷ");
        first.set("Số thang máy", "2");
        first.latitude = Some(10.762622);
        first.longitude = Some(106.660172);

        let mut second = PropertyRecord::new("https://batdongsan.com.vn/pr2");
        second.set("Địa chỉ", "Quận 1, \"Hồ Chí Minh\"");
        second.set("Hướng nhà", "Đông - Nam");
        second.set("Chiều sâu", "20 m");

        vec![first, second]
    }

    fn read_back(bytes: &[u8]) -> (Vec<String>, Vec<HashMap<String, String>>) {
        assert!(bytes.starts_with(BOM));
        let mut reader = ReaderBuilder::new().from_reader(&bytes[BOM.len()..]);
        let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|row| {
                let row = row.unwrap();
                headers
                    .iter()
                    .cloned()
                    .zip(row.iter().map(str::to_string))
                    .collect()
            })
            .collect();
        (headers, rows)
    }

    #[test]
    fn header_is_known_fields_then_extras_in_first_seen_order() {
        let columns = columns(&sample());

        assert_eq!(columns.len(), 16 + 3 + 2);
        assert_eq!(columns[0], "Diện tích");
        assert_eq!(columns[15], "Địa chỉ");
        assert_eq!(&columns[16..19], &["latitude", "longitude", "url"]);
        assert_eq!(&columns[19..], &["Số thang máy", "Chiều sâu"]);
    }

    #[test]
    fn round_trip_keeps_urls_and_non_empty_values() {
        let records = sample();
        let bytes = to_csv(&records).unwrap();
        let (headers, rows) = read_back(&bytes);

        assert_eq!(headers, columns(&records));

        let urls: HashSet<&str> = rows.iter().map(|r| r["url"].as_str()).collect();
        assert_eq!(
            urls,
            HashSet::from(["https://batdongsan.com.vn/pr1", "https://batdongsan.com.vn/pr2"])
        );

        for record in &records {
            let row = rows.iter().find(|r| r["url"] == record.url).unwrap();
            for column in &headers {
                match record.column(column) {
                    Some(value) => assert_eq!(&row[column], &value),
                    None => assert_eq!(row[column], ""),
                }
            }
        }
    }

    #[test]
    fn coordinates_are_written_as_plain_decimals() {
        let bytes = to_csv(&sample()).unwrap();
        let (_, rows) = read_back(&bytes);

        assert_eq!(rows[0]["latitude"].parse::<f64>().unwrap(), 10.762622);
        assert_eq!(rows[0]["longitude"].parse::<f64>().unwrap(), 106.660172);
        assert_eq!(rows[1]["latitude"], "");
    }

    #[test]
    fn page_value_titled_url_keeps_its_own_column() {
        let mut record = PropertyRecord::new("https://batdongsan.com.vn/pr1");
        record.set("url", "https://example.com/tour");
        let bytes = to_csv(&[record]).unwrap();
        let (headers, rows) = read_back(&bytes);

        assert_eq!(headers.iter().filter(|h| h.as_str() == "url").count(), 1);
        assert_eq!(rows[0]["url"], "https://batdongsan.com.vn/pr1");
        assert_eq!(rows[0]["url (page)"], "https://example.com/tour");
    }

    #[test]
    fn empty_collection_still_has_a_header() {
        let bytes = to_csv(&[]).unwrap();
        let (headers, rows) = read_back(&bytes);

        assert_eq!(headers.len(), 19);
        assert!(rows.is_empty());
    }
}
