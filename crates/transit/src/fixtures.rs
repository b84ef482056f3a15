//! The Kathmandu reference network the system ships with.
//!
//! Three routes: the circular Ring Road line, the Balaju–city there-and-back
//! line, and the Balkumari–Gopi Krishna cross-town line. Ring Road stations
//! carry split carriageway coordinates; core-city stops on undivided roads
//! use a single coordinate for both directions.
//!
//! Also the realistic dataset the test suites run against.

use geo::Point;

use crate::graph::RouteGraph;
use crate::identifiers::StationIdentifier;
use crate::models::{Result, Route, Station};

fn split(id: &str, name: &str, cw: (f64, f64), acw: (f64, f64)) -> Station {
    let cw = Point::new(cw.1, cw.0);
    let acw = Point::new(acw.1, acw.0);
    Station::new(id, name, cw).with_carriageways(cw, acw)
}

fn single(id: &str, name: &str, at: (f64, f64)) -> Station {
    Station::new(id, name, Point::new(at.1, at.0))
}

fn stations() -> Vec<Station> {
    vec![
        // Ring Road (dual carriageway throughout)
        split("kalanki", "Kalanki", (27.695695, 85.281364), (27.696294, 85.281760)),
        split("bafal", "Bafal", (27.700996, 85.281580), (27.700834, 85.281956)),
        split("sitapaila", "Sitapaila", (27.706985, 85.282314), (27.707298, 85.282727)),
        split("swyambhu", "Swoyambhu", (27.716473, 85.283498), (27.715681, 85.283717)),
        split("thulo-bharyang", "Thulo Bharyang", (27.719809, 85.287085), (27.719990, 85.287956)),
        split("sano-bharyang", "Sano Bharyang", (27.7215, 85.2910), (27.7212, 85.2905)),
        split("dhungedhara", "Dhungedhara", (27.723456, 85.294579), (27.723082, 85.294263)),
        split("banasthali", "Banasthali", (27.725005, 85.298022), (27.724523, 85.297280)),
        split("balaju", "Balaju", (27.727447, 85.304864), (27.726644, 85.304293)),
        split("macchapokhari", "Macchapokhari", (27.735489, 85.305954), (27.734755, 85.305742)),
        split("gongabu", "Gongabu", (27.735128, 85.314454), (27.734780, 85.314232)),
        split("samakhushi", "Samakhushi", (27.735259, 85.318632), (27.734888, 85.317522)),
        split("basundhara", "Basundhara", (27.742255, 85.332266), (27.741833, 85.331671)),
        split("maharajgunj", "Maharajgunj", (27.739912, 85.337654), (27.739996, 85.336783)),
        split("chabahil", "Chabahil", (27.716742, 85.346665), (27.717429, 85.346524)),
        split("koteshwor", "Koteshwor", (27.680655, 85.349740), (27.679871, 85.349417)),
        split("balkumari", "Balkumari", (27.673766, 85.342867), (27.673933, 85.342479)),
        split("gwarko", "Gwarko", (27.667700, 85.333892), (27.667816, 85.333281)),
        split("satdobato", "Satdobato", (27.658329, 85.324378), (27.659025, 85.324898)),
        split("balkhu", "Balkhu", (27.684248, 85.301314), (27.684381, 85.302051)),
        // Balaju–city line
        split("raniban", "Raniban", (27.730132, 85.287483), (27.730085, 85.287453)),
        split("nayabazar", "Nayabazar", (27.725193, 85.305748), (27.724979, 85.305634)),
        split("sorhakhutte", "Sorhakhutte", (27.719656, 85.309413), (27.719512, 85.309368)),
        split("thamel", "Thamel", (27.718214, 85.312036), (27.718143, 85.311736)),
        split("lainchaur", "Lainchaur", (27.717339, 85.314983), (27.717154, 85.314949)),
        single("jamal", "Jamal", (27.709164, 85.316273)),
        single("ratnapark", "Ratnapark", (27.706458, 85.316478)),
        single("bhadrakali", "Bhadrakali Mandir", (27.699491, 85.316465)),
        single("nac", "NAC Bus Stop", (27.702464, 85.313506)),
        // Cross-town line
        split("parliament", "Central Parliament", (27.687923, 85.336286), (27.688298, 85.336270)),
        split("baneshwor", "Naya Baneshwor", (27.690330, 85.335755), (27.690426, 85.335764)),
        split("thapagaun", "Thapagaun", (27.691458, 85.332585), (27.691520, 85.332659)),
        split("hanumanthan", "Hanumanthan", (27.693118, 85.327594), (27.693137, 85.327739)),
        split("anamnagar", "Anamnagar Bus Stop", (27.699392, 85.328614), (27.699467, 85.328690)),
        split("new-plaza", "New Plaza", (27.700670, 85.323556), (27.700716, 85.323689)),
        split("dillibazar", "Dillibazar", (27.705782, 85.322860), (27.705784, 85.322962)),
        split("narayan-gopal", "Narayan Gopal Chowk", (27.739940, 85.336989), (27.739742, 85.337050)),
        split("gopi-krishna", "Gopi Krishna Stop", (27.722773, 85.345382), (27.722685, 85.345028)),
    ]
}

fn ids(names: &[&str]) -> Vec<StationIdentifier> {
    names.iter().map(StationIdentifier::new).collect()
}

fn routes() -> Vec<Route> {
    vec![
        Route::new(
            "R1",
            "Mahanagar Yatayat",
            ids(&[
                "kalanki", "bafal", "sitapaila", "swyambhu", "thulo-bharyang",
                "sano-bharyang", "dhungedhara", "banasthali", "balaju",
                "macchapokhari", "gongabu", "samakhushi", "basundhara",
                "maharajgunj", "chabahil", "koteshwor", "balkumari",
                "gwarko", "satdobato", "balkhu", "kalanki",
            ]),
            true,
            "#f97316",
        ),
        // One-way city loop ridden out and back: the station list repeats in
        // reverse, which is the linear there-and-back pattern.
        Route::new(
            "R2",
            "Balaju Yatayat",
            ids(&[
                "raniban", "dhungedhara", "banasthali", "balaju", "nayabazar",
                "sorhakhutte", "thamel", "lainchaur", "jamal", "ratnapark",
                "bhadrakali", "nac", "lainchaur", "thamel", "sorhakhutte",
                "nayabazar", "balaju", "banasthali", "dhungedhara", "raniban",
            ]),
            false,
            "#10b981",
        ),
        Route::new(
            "R3",
            "Nepal Yatayat",
            ids(&[
                "balkumari", "koteshwor", "parliament", "baneshwor", "thapagaun",
                "hanumanthan", "anamnagar", "new-plaza", "dillibazar",
                "narayan-gopal", "gopi-krishna",
            ]),
            false,
            "#3b82f6",
        ),
    ]
}

/// The full Kathmandu network.
pub fn kathmandu() -> Result<RouteGraph> {
    RouteGraph::new(stations(), routes())
}
