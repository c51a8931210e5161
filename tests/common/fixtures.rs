//! Upstream response bodies shaped like the Ergast API

use serde_json::{Value, json};

/// Season calendar with two races; the first has no start time
pub fn season_2021() -> Value {
    json!({"MRData": {
        "series": "f1",
        "limit": "30",
        "offset": "0",
        "total": "2",
        "RaceTable": {"season": "2021", "Races": [
            {
                "season": "2021", "round": "1", "raceName": "Bahrain Grand Prix",
                "date": "2021-03-28",
                "Circuit": {
                    "circuitId": "bahrain", "circuitName": "Bahrain International Circuit",
                    "Location": {"lat": "26.0325", "long": "50.5106", "locality": "Sakhir", "country": "Bahrain"}
                }
            },
            {
                "season": "2021", "round": "2", "raceName": "Emilia Romagna Grand Prix",
                "date": "2021-04-18", "time": "13:00:00Z",
                "Circuit": {
                    "circuitId": "imola", "circuitName": "Autodromo Enzo e Dino Ferrari",
                    "Location": {"lat": "44.3439", "long": "11.7167", "locality": "Imola", "country": "Italy"}
                }
            }
        ]}
    }})
}

/// Results of one race with two classified drivers
pub fn results(round: &str, winner: &str, second: &str) -> Value {
    json!({"MRData": {"total": "2", "RaceTable": {"season": "2021", "round": round, "Races": [{
        "season": "2021", "round": round,
        "Results": [
            {
                "number": "1", "position": "1", "points": "25",
                "Driver": {"driverId": winner, "familyName": winner},
                "Constructor": {"constructorId": "team_a", "name": "Team A"},
                "grid": "1", "laps": "56", "status": "Finished",
                "Time": {"millis": "5523897", "time": "1:32:03.897"}
            },
            {
                "number": "2", "position": "2", "points": "18",
                "Driver": {"driverId": second, "familyName": second},
                "Constructor": {"constructorId": "team_b", "name": "Team B"},
                "grid": "2", "laps": "56", "status": "Finished"
            }
        ]
    }]}}})
}

/// Driver standings after a race with two entries
pub fn driver_standings(round: &str) -> Value {
    json!({"MRData": {"total": "2", "StandingsTable": {"season": "2021", "round": round, "StandingsLists": [{
        "season": "2021", "round": round,
        "DriverStandings": [
            {"position": "1", "points": "25", "wins": "1",
             "Driver": {"driverId": "hamilton", "familyName": "Hamilton"},
             "Constructors": [{"constructorId": "mercedes", "name": "Mercedes"}]},
            {"position": "2", "points": "18", "wins": "0",
             "Driver": {"driverId": "max_verstappen", "familyName": "Verstappen"},
             "Constructors": [{"constructorId": "red_bull", "name": "Red Bull"}]}
        ]
    }]}}})
}

/// A per-race response for a round that has no data yet
pub fn empty_races() -> Value {
    json!({"MRData": {"total": "0", "RaceTable": {"Races": []}}})
}
