//! Sample incidents used to seed an empty store

use crate::models::{IncidentCategory, NewIncident, Position};

use IncidentCategory::{AbuseReport, GeneralReport, PoisoningAlert};

const SAMPLES: [(&str, f64, f64, &str, &str, IncidentCategory); 20] = [
    ("中環 (Central)", 22.2783, 114.1747, "Animal lover", "Several stray cats gathering", GeneralReport),
    ("旺角 (Mong Kok)", 22.3167, 114.1717, "Volunteer", "Stray dog searching for food", GeneralReport),
    ("尖沙咀 (Tsim Sha Tsui)", 22.2988, 114.1722, "Citizen A", "Suspicious poison bait found", PoisoningAlert),
    ("銅鑼灣 (Causeway Bay)", 22.2807, 114.1848, "Cat lover", "Injured stray cat needs rescue", GeneralReport),
    ("九龍公園 (Kowloon Park)", 22.3000, 114.1700, "Guardian", "Someone mistreating a stray dog", AbuseReport),
    ("沙田 (Sha Tin)", 22.3811, 114.1888, "Good samaritan", "Poison found inside the park", PoisoningAlert),
    ("荃灣 (Tsuen Wan)", 22.3707, 114.1048, "Dog owner", "Stray dog abandoned", GeneralReport),
    ("元朗 (Yuen Long)", 22.4445, 114.0222, "Resident B", "Cat abuse near the farmland", AbuseReport),
    ("西貢 (Sai Kung)", 22.3813, 114.2705, "Hiker", "Injured stray dog found", GeneralReport),
    ("大埔 (Tai Po)", 22.4480, 114.1642, "Student", "Poison bait in the industrial area", PoisoningAlert),
    ("觀塘 (Kwun Tong)", 22.3121, 114.2257, "Volunteer worker", "Stray cat trapped, needs rescue", GeneralReport),
    ("深水埗 (Sham Shui Po)", 22.3307, 114.1622, "Concerned citizen", "Street animals being abused", AbuseReport),
    ("維多利亞公園 (Victoria Park)", 22.2820, 114.1902, "Runner", "Poison in a corner of the park", PoisoningAlert),
    ("油麻地 (Yau Ma Tei)", 22.3128, 114.1708, "Citizen C", "Stray dog needs medical help", GeneralReport),
    ("屯門 (Tuen Mun)", 22.3918, 113.9725, "Dog lover", "Animal abuse case discovered", AbuseReport),
    ("北角 (North Point)", 22.2910, 114.2007, "Neighbour", "Suspicious poison in the back alley", PoisoningAlert),
    ("大嶼山 (Lantau Island)", 22.2687, 113.9461, "Villager", "Abandoned cat found", GeneralReport),
    ("將軍澳 (Tseung Kwan O)", 22.3080, 114.2586, "Family", "Someone abusing stray cats", AbuseReport),
    ("紅磡 (Hung Hom)", 22.3061, 114.1838, "Worker", "Poison bait near the pier", PoisoningAlert),
    ("石硤尾 (Shek Kip Mei)", 22.3330, 114.1668, "Resident D", "Stray animals gathering, need attention", GeneralReport),
];

/// The sample incident set shipped with the server
#[must_use]
pub fn sample_incidents() -> Vec<NewIncident> {
    SAMPLES
        .iter()
        .map(
            |&(location, latitude, longitude, reporter, description, category)| NewIncident {
                location_name: location.to_string(),
                position: Position::new(latitude, longitude),
                reporter_name: reporter.to_string(),
                description: description.to_string(),
                category,
                contact_info: None,
                image_data: None,
            },
        )
        .collect()
}
