pub mod header;
pub mod spectrum;
pub mod station_list;
