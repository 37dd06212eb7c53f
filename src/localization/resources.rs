//! The official place-resource catalog.

/// Total number of official resources.
pub const DEFAULT_RESOURCE_COUNT: usize = 126;

/// Resources highlighted by the API as important.
pub const IMPORTANT_RESOURCE_IDS: [&str; 30] = [
    "resource_1", "resource_3", "resource_4", "resource_5", "resource_6",
    "resource_7", "resource_8", "resource_9", "resource_10", "resource_25",
    "resource_28", "resource_36", "resource_37", "resource_45", "resource_57",
    "resource_61", "resource_63", "resource_68", "resource_71", "resource_76",
    "resource_81", "resource_86", "resource_92", "resource_95", "resource_97",
    "resource_99", "resource_101", "resource_105", "resource_107", "resource_125",
];

/// English names, index `i` naming `resource_{i+1}`.
pub const RESOURCE_NAMES_EN: [&str; DEFAULT_RESOURCE_COUNT] = [
    "Hand sanitizer at entrances",
    "Soap and water available",
    "Face masks required",
    "Face masks provided",
    "Staff wearing masks",
    "Social distancing enforced",
    "Distancing floor markers",
    "Contactless payment",
    "Plexiglass barriers at counters",
    "Frequently disinfected surfaces",
    "Disinfecting wipes available",
    "Gloves provided",
    "Gloves worn by staff",
    "Temperature checks at entry",
    "Health declaration required",
    "Capacity limits enforced",
    "Outdoor seating available",
    "Curbside pickup",
    "Delivery available",
    "Online ordering",
    "Appointment-only service",
    "Timed entry slots",
    "One-way aisles",
    "Separate entrance and exit",
    "Well-ventilated space",
    "Air purifiers in use",
    "Windows kept open",
    "Daily deep cleaning",
    "Cleaning log displayed",
    "Restrooms cleaned hourly",
    "Touchless door entry",
    "Automatic doors",
    "Touchless faucets",
    "Touchless soap dispensers",
    "Touchless paper towel dispensers",
    "Hand washing stations",
    "Sanitizer refill stations",
    "Disposable utensils",
    "Single-use menus",
    "Digital menus",
    "Pre-packaged food only",
    "No self-serve food",
    "Covered food displays",
    "Sneeze guards at buffets",
    "Staff health screening",
    "Staff trained on hygiene protocols",
    "Sick-leave policy for staff",
    "Reduced-contact checkout",
    "Self-checkout lanes",
    "Dedicated senior hours",
    "Priority access for medical workers",
    "Quarantine-supply packages",
    "Prescription pickup window",
    "Pharmacy on site",
    "First-aid kits available",
    "Thermometers for sale",
    "Face masks for sale",
    "Hand sanitizer for sale",
    "Disinfectant for sale",
    "Toilet paper in stock",
    "Bottled water in stock",
    "Canned goods in stock",
    "Fresh produce in stock",
    "Baby supplies in stock",
    "Pet supplies in stock",
    "Cleaning supplies in stock",
    "Paper goods in stock",
    "Over-the-counter medicine in stock",
    "Cold and flu medicine in stock",
    "Vitamins in stock",
    "Protective equipment in stock",
    "Batteries in stock",
    "Flashlights in stock",
    "Fuel available",
    "Propane available",
    "ATM on site",
    "Cash accepted",
    "Credit cards accepted",
    "Mobile payment accepted",
    "Public restroom available",
    "Accessible restroom",
    "Baby changing station",
    "Wheelchair accessible",
    "Elevator available",
    "Stroller friendly",
    "Parking available",
    "Bicycle parking",
    "Near public transit",
    "Drive-through service",
    "Walk-up window",
    "24-hour service",
    "Extended hours",
    "Weekend hours",
    "Staffed information desk",
    "Multilingual staff",
    "Quiet hours",
    "Low-sensory environment",
    "Free Wi-Fi",
    "Phone charging stations",
    "Water fountain available",
    "Water bottle refill station",
    "Seating available",
    "Shaded waiting area",
    "Sheltered waiting area",
    "Queue management system",
    "Waiting time displayed",
    "Text-ahead waitlist",
    "Reservations accepted",
    "Family restroom",
    "Nursing room",
    "Pet relief area",
    "Service animals welcome",
    "Lost and found",
    "Security on site",
    "Well-lit at night",
    "Emergency exits marked",
    "Defibrillator on site",
    "Trained first-aid staff",
    "COVID-19 testing nearby",
    "Vaccination site nearby",
    "Telehealth kiosks",
    "Health information displayed",
    "Local health hotline posted",
    "Community bulletin board",
    "Donation drop-off point",
    "Volunteer sign-up point",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn important_ids_are_all_in_range() {
        for id in IMPORTANT_RESOURCE_IDS {
            let n: usize = id
                .strip_prefix("resource_")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            assert!((1..=DEFAULT_RESOURCE_COUNT).contains(&n), "bad id {id}");
        }
    }

    #[test]
    fn important_ids_are_unique() {
        let mut ids: Vec<&str> = IMPORTANT_RESOURCE_IDS.to_vec();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), IMPORTANT_RESOURCE_IDS.len());
    }
}
